//! Structured output schemas built from answer shape hints
//!
//! The same letter and pair bounds the prompt states are enforced here, so a
//! provider with constrained decoding cannot return a wrongly sized answer.

use quizpilot_core::AnswerShapeHints;
use serde_json::{json, Value};

/// Schema flavor accepted by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDialect {
    /// Gemini `responseSchema`: optional fields stay out of `required`,
    /// key order pinned with `propertyOrdering`
    Gemini,
    /// OpenAI `json_schema` with `strict: true`: nullable explanation,
    /// `additionalProperties: false`
    OpenAi,
}

/// Schema name sent with OpenAI-style strict requests
pub fn schema_name(hints: &AnswerShapeHints) -> &'static str {
    if hints.is_pairs() {
        "sort_pairs"
    } else {
        "answer_schema"
    }
}

/// Build the answer schema for the given hints
pub fn answer_schema(hints: &AnswerShapeHints, dialect: SchemaDialect) -> Value {
    match hints.pair_bounds() {
        Some((rows, items)) => pairs_schema(rows, items, dialect),
        None => letters_schema(hints, dialect),
    }
}

fn explanation_schema(dialect: SchemaDialect) -> Value {
    match dialect {
        SchemaDialect::Gemini => json!({ "type": "string" }),
        SchemaDialect::OpenAi => json!({ "anyOf": [{ "type": "string" }, { "type": "null" }] }),
    }
}

fn letters_schema(hints: &AnswerShapeHints, dialect: SchemaDialect) -> Value {
    let letters: Vec<String> = hints
        .allowed_letters()
        .into_iter()
        .map(String::from)
        .collect();

    let mut schema = json!({
        "type": "object",
        "properties": {
            "letters": {
                "type": "array",
                "items": { "type": "string", "enum": letters },
                "minItems": hints.min_items(),
                "maxItems": hints.max_items(),
            },
            "explanation": explanation_schema(dialect),
        },
        "required": ["letters"],
    });

    match dialect {
        SchemaDialect::Gemini => {
            schema["propertyOrdering"] = json!(["letters", "explanation"]);
        }
        SchemaDialect::OpenAi => {
            schema["additionalProperties"] = json!(false);
        }
    }
    schema
}

fn pairs_schema(rows: usize, items: usize, dialect: SchemaDialect) -> Value {
    let mut pair = json!({
        "type": "object",
        "properties": {
            "row": { "type": "integer", "minimum": 1, "maximum": rows },
            "item": { "type": "integer", "minimum": 1, "maximum": items },
        },
        "required": ["row", "item"],
    });

    let mut schema = json!({
        "type": "object",
        "properties": {
            "pairs": {
                "type": "array",
                "items": Value::Null,
                "minItems": 1,
                "maxItems": rows,
            },
            "explanation": explanation_schema(dialect),
        },
        "required": ["pairs"],
    });

    match dialect {
        SchemaDialect::Gemini => {
            pair["propertyOrdering"] = json!(["row", "item"]);
            schema["propertyOrdering"] = json!(["pairs", "explanation"]);
        }
        SchemaDialect::OpenAi => {
            pair["additionalProperties"] = json!(false);
            schema["additionalProperties"] = json!(false);
        }
    }
    schema["properties"]["pairs"]["items"] = pair;
    schema
}
