//! Extraction strategies, tried in order until one yields a candidate

use quizpilot_core::SortPair;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// What the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Letters,
    Pairs,
}

impl AnswerMode {
    fn field(&self) -> &'static str {
        match self {
            Self::Letters => "letters",
            Self::Pairs => "pairs",
        }
    }
}

/// Raw candidate before reconciliation against the option set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Letter codes or option contents, exactly as the model wrote them
    Letters {
        tokens: Vec<String>,
        explanation: Option<String>,
    },
    Pairs {
        pairs: Vec<SortPair>,
        explanation: Option<String>,
    },
}

pub type Strategy = fn(&str, AnswerMode) -> Option<Extracted>;

/// Strategies in the order they are tried
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("strict-json", strict_json),
    ("fenced-json", fenced_json),
    ("balanced-json", balanced_json),
    ("heuristic", heuristic),
];

/// The whole reply is one JSON object with the expected array field
pub fn strict_json(text: &str, mode: AnswerMode) -> Option<Extracted> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    from_value(&value, mode)
}

/// JSON inside the first fenced code block
pub fn fenced_json(text: &str, mode: AnswerMode) -> Option<Extracted> {
    let inner = fence_pattern().captures(text)?.get(1)?.as_str();
    strict_json(inner, mode).or_else(|| balanced_json(inner, mode))
}

/// Opening braces tried by [`balanced_json`] before it gives up
const MAX_SPAN_STARTS: usize = 64;

/// First balanced `{...}` span that parses and carries the expected field
///
/// Only the first [`MAX_SPAN_STARTS`] opening braces are tried, which keeps
/// replies full of unmatched braces linear in their length.
pub fn balanced_json(text: &str, mode: AnswerMode) -> Option<Extracted> {
    let bytes = text.as_bytes();
    for (start, _) in text.match_indices('{').take(MAX_SPAN_STARTS) {
        let Some(end) = balanced_end(bytes, start) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) else {
            continue;
        };
        if let Some(extracted) = from_value(&value, mode) {
            return Some(extracted);
        }
    }
    None
}

/// Pattern matching on prose
pub fn heuristic(text: &str, mode: AnswerMode) -> Option<Extracted> {
    match mode {
        AnswerMode::Letters => {
            let tokens = letters_assignment(text).or_else(|| single_letters(text))?;
            Some(Extracted::Letters {
                tokens,
                explanation: None,
            })
        }
        AnswerMode::Pairs => {
            let pairs = numeric_pairs(text)?;
            Some(Extracted::Pairs {
                pairs,
                explanation: None,
            })
        }
    }
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("valid regex pattern"))
}

fn letters_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)letters?\s*[:=]\s*\[([^\]]+)\]").expect("valid regex pattern")
    })
}

fn pairs_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:row\s*)?(\d+)\s*(?:->|=>|→|-|:|=)\s*(?:item\s*)?(\d+)")
            .expect("valid regex pattern")
    })
}

/// Index of the brace closing the one at `start`; braces inside JSON
/// strings are ignored
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn explanation_of(value: &Value) -> Option<String> {
    value
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn from_value(value: &Value, mode: AnswerMode) -> Option<Extracted> {
    let field = value.as_object()?.get(mode.field())?;
    let explanation = explanation_of(value);
    match mode {
        AnswerMode::Letters => Some(Extracted::Letters {
            tokens: letter_tokens(field)?,
            explanation,
        }),
        AnswerMode::Pairs => Some(Extracted::Pairs {
            pairs: pair_values(field)?,
            explanation,
        }),
    }
}

/// `letters` as an array, or a comma separated string
fn letter_tokens(field: &Value) -> Option<Vec<String>> {
    match field {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// `pairs` as `{row, item}` objects or `[row, item]` arrays; entries that
/// are not two positive integers are skipped
fn pair_values(field: &Value) -> Option<Vec<SortPair>> {
    let items = field.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|entry| {
                let (row, item) = match entry {
                    Value::Object(map) => (map.get("row")?, map.get("item")?),
                    Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
                    _ => return None,
                };
                let row = positive_index(row)?;
                let item = positive_index(item)?;
                Some(SortPair::new(row, item))
            })
            .collect(),
    )
}

fn positive_index(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    usize::try_from(n).ok().filter(|n| *n > 0)
}

/// Letter tokens of an explicit `letters: [...]` in prose
///
/// Entries that are not a single letter are dropped; a list with none left
/// yields `None` so the isolated-letter scan gets its turn.
fn letters_assignment(text: &str) -> Option<Vec<String>> {
    let list = letters_pattern().captures(text)?.get(1)?.as_str();
    let tokens: Vec<String> = list
        .split(',')
        .map(|part| {
            part.trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|part| is_letter_token(part))
        .collect();
    (!tokens.is_empty()).then_some(tokens)
}

fn is_letter_token(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

/// Isolated uppercase letters, e.g. the `C` in "Answer: C."
fn single_letters(text: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<String> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_uppercase() {
            continue;
        }
        let starts_word = i == 0 || !chars[i - 1].is_alphanumeric();
        let ends_word = chars
            .get(i + 1)
            .map_or(true, |next| next.is_whitespace() || ".,;:!?)".contains(*next));
        if starts_word && ends_word {
            let token = c.to_string();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    (!tokens.is_empty()).then_some(tokens)
}

/// `row -> item` style pairs in prose
fn numeric_pairs(text: &str) -> Option<Vec<SortPair>> {
    let pairs: Vec<SortPair> = pairs_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let row: usize = caps.get(1)?.as_str().parse().ok()?;
            let item: usize = caps.get(2)?.as_str().parse().ok()?;
            (row > 0 && item > 0).then_some(SortPair::new(row, item))
        })
        .collect();
    (!pairs.is_empty()).then_some(pairs)
}
