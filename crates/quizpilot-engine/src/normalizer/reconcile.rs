//! Mapping raw letter tokens back onto the current option set

use quizpilot_core::{AnswerOption, SortPair, DEFAULT_LETTERS};
use tracing::warn;

/// Turn raw tokens into option letters
///
/// A token that is a valid letter code (any case) is kept. Otherwise it is
/// matched case-insensitively against option contents. Tokens matching
/// neither are dropped. The result is deduplicated in first-seen order.
pub fn reconcile_letters(tokens: &[String], options: &[AnswerOption]) -> Vec<char> {
    let valid: Vec<char> = if options.is_empty() {
        DEFAULT_LETTERS.to_vec()
    } else {
        options.iter().map(|o| o.letter).collect()
    };

    let mut letters: Vec<char> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.trim();
        match letter_code(token, &valid).or_else(|| content_match(token, options)) {
            Some(letter) if !letters.contains(&letter) => letters.push(letter),
            Some(_) => {}
            None => warn!(token, "Dropping answer token that matches no option"),
        }
    }
    letters
}

fn letter_code(token: &str, valid: &[char]) -> Option<char> {
    let mut chars = token.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    (chars.next().is_none() && valid.contains(&letter)).then_some(letter)
}

fn content_match(token: &str, options: &[AnswerOption]) -> Option<char> {
    let wanted = token.to_lowercase();
    options
        .iter()
        .find(|o| o.content.trim().to_lowercase() == wanted)
        .map(|o| o.letter)
}

/// Deduplicate identical pairs, keeping first-seen order
pub fn dedupe_pairs(pairs: Vec<SortPair>) -> Vec<SortPair> {
    let mut out: Vec<SortPair> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if !out.contains(&pair) {
            out.push(pair);
        }
    }
    out
}
