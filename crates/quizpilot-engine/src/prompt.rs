//! Provider-agnostic prompt construction
//!
//! Builds the instruction text for a question plus the shape hints the
//! schema-aware adapters enforce. Nothing here touches the network or fails.

use quizpilot_core::{AnswerOption, AnswerShapeHints, QuestionKind, QuestionSnapshot, SortEntry};
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_SORT_STEM: &str = "Match each item to the most appropriate category.";

/// Prompt text and the matching answer shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    pub text: String,
    pub hints: AnswerShapeHints,
}

fn exact_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:select|choose|pick|mark|check|identify|which)\b(?:\s+(?:the|exactly|only|any))*\s+(\d{1,2}|one|two|three|four|five|six|seven|eight|nine|ten|both)\b(?:\s+(\w+))?",
        )
        .expect("exact count pattern is valid")
    })
}

fn number_word(word: &str) -> Option<usize> {
    let n = match word.to_lowercase().as_str() {
        "one" => 1,
        "two" | "both" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => digits.parse().ok()?,
    };
    (n > 0).then_some(n)
}

/// Words after a number that make it something other than a count
const NOT_A_COUNT: [&str; 5] = ["or", "of", "and", "more", "at"];

/// Required answer count stated in a question stem, if any
///
/// Recognizes phrasings like "Select the two correct answers",
/// "Choose 3 that apply", "Which two statements..." and "Select both".
/// "Select one or more" and "Which one of the following" state no count.
pub fn detect_exact_count(stem: &str) -> Option<usize> {
    exact_count_pattern().captures_iter(stem).find_map(|captures| {
        let next = captures.get(2).map(|m| m.as_str().to_lowercase());
        if next.is_some_and(|word| NOT_A_COUNT.contains(&word.as_str())) {
            return None;
        }
        number_word(captures.get(1)?.as_str())
    })
}

/// Question stem followed by the deduplicated option display strings
pub fn build_prompt(stem: &str, options: &[AnswerOption]) -> String {
    let mut lines = vec![stem.to_string(), String::new(), "Options:".to_string()];
    for display in options.iter().map(AnswerOption::display) {
        if !lines[3..].contains(&display) {
            lines.push(display);
        }
    }
    lines.join("\n")
}

/// Sort prompt: enumerated items, enumerated rows, and the pairing task
pub fn build_sort_prompt(stem: &str, items: &[SortEntry], rows: &[SortEntry]) -> String {
    let stem = if stem.trim().is_empty() {
        DEFAULT_SORT_STEM
    } else {
        stem
    };

    let mut lines = vec![stem.to_string(), String::new(), "Items:".to_string()];
    lines.extend(items.iter().map(|item| format!("{}. {}", item.index, item.text)));
    lines.push(String::new());
    lines.push("Rows to fill:".to_string());
    lines.extend(rows.iter().map(|row| format!("{}. {}", row.index, row.text)));
    lines.push(String::new());
    lines.push("Task: For each row, choose exactly one item number that best matches.".to_string());
    lines.push("Use each item at most once unless the UI clearly allows repeats.".to_string());
    lines.push(
        r#"Respond ONLY with a single JSON object: {"pairs":[{"row":<rowNumber>,"item":<itemNumber>}, ...], "explanation":"optional"}"#
            .to_string(),
    );
    lines.join("\n")
}

/// Full prompt and shape hints for one question
pub fn plan_prompt(snapshot: &QuestionSnapshot, kind: QuestionKind, has_images: bool) -> PromptPlan {
    let base = match kind {
        QuestionKind::Sort => build_sort_prompt(&snapshot.stem, &snapshot.items, &snapshot.slots),
        QuestionKind::Single | QuestionKind::Multiple => build_prompt(&snapshot.stem, &snapshot.options),
    };

    let mut text = format!("{}\n\n", base);
    if has_images {
        text.push_str(
            "Note: An image of the entire screen is provided. Analyze the visual context with the text.\n\n",
        );
    }

    let hints = match kind {
        QuestionKind::Sort => AnswerShapeHints::Pairs {
            rows: snapshot.slots.len(),
            items: snapshot.items.len(),
        },
        QuestionKind::Multiple => {
            let exact_count = detect_exact_count(&snapshot.stem);
            text.push_str("Task: This is a multiple-choice question where MULTIPLE answers can be correct. You MUST identify ALL correct options.\n");
            match exact_count {
                Some(n) => text.push_str(&format!(
                    "Exactly {n} answers are correct. Return exactly {n} letters.\n"
                )),
                None => text.push_str(
                    "Return ALL correct options in an array, even if there are multiple correct answers.\n",
                ),
            }
            text.push_str(r#"Provide your answer in the format: {"letters": ["A", "C"], "explanation": "[Few words why]"}"#);
            text.push('\n');
            text.push_str("IMPORTANT: Use ONLY option letters (A, B, C, etc.).\n");
            text.push_str("Respond ONLY with a single JSON object as described. Do not include any other text.\n");
            text.push_str("\nFor reference, here are the options:\n");
            for option in &snapshot.options {
                text.push_str(&option.display());
                text.push('\n');
            }
            AnswerShapeHints::Letters {
                allowed: snapshot.letters(),
                multiple: true,
                exact_count,
            }
        }
        QuestionKind::Single => {
            text.push_str(r#"Task: Identify the single best option. Provide your answer in the format: {"letters": ["A"], "explanation": "[Few words why]"}"#);
            text.push('\n');
            text.push_str("Respond ONLY with a single JSON object as described. Do not include any other text.\n");
            AnswerShapeHints::Letters {
                allowed: snapshot.letters(),
                multiple: false,
                exact_count: None,
            }
        }
    };

    PromptPlan { text, hints }
}
