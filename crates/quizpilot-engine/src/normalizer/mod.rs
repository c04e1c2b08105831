//! Response normalization
//!
//! Turns the text blob of a provider reply into a [`NormalizedAnswer`]. The
//! strategies in [`strategies::STRATEGIES`] are tried in order and the first
//! candidate wins; letter candidates are then reconciled against the option
//! set. A reconciled answer with zero letters is returned as is. Checking the
//! answer against the question's bounds is left to the caller.

mod reconcile;
mod strategies;

use quizpilot_core::{NormalizedAnswer, QuestionKind, QuestionSnapshot, QuizError, Result};
use tracing::debug;

pub use reconcile::{dedupe_pairs, reconcile_letters};
pub use strategies::{
    balanced_json, fenced_json, heuristic, strict_json, AnswerMode, Extracted, Strategy, STRATEGIES,
};

impl From<QuestionKind> for AnswerMode {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Sort => AnswerMode::Pairs,
            QuestionKind::Single | QuestionKind::Multiple => AnswerMode::Letters,
        }
    }
}

/// Normalize a reply for a question of the given kind
pub fn normalize(text: &str, kind: QuestionKind, snapshot: &QuestionSnapshot) -> Result<NormalizedAnswer> {
    let mode = AnswerMode::from(kind);

    for (name, strategy) in STRATEGIES.iter() {
        let Some(extracted) = strategy(text, mode) else {
            continue;
        };
        debug!(strategy = name, %kind, "Reply parsed");
        return Ok(match extracted {
            Extracted::Letters { tokens, explanation } => NormalizedAnswer::Letters {
                letters: reconcile_letters(&tokens, &snapshot.options),
                explanation,
            },
            Extracted::Pairs { pairs, explanation } => NormalizedAnswer::Pairs {
                pairs: dedupe_pairs(pairs),
                explanation,
            },
        });
    }

    Err(QuizError::Parse(format!(
        "Could not parse {} from provider response",
        match mode {
            AnswerMode::Letters => "answer letters",
            AnswerMode::Pairs => "sort pairs",
        }
    )))
}
