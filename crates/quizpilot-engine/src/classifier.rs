//! Question classification from page structure

use quizpilot_core::QuestionKind;

use crate::page::PageSignals;

type Rule = fn(&PageSignals) -> bool;

/// Rules in priority order; the first match wins
const RULES: [(QuestionKind, Rule); 2] = [
    (QuestionKind::Sort, is_sort),
    (QuestionKind::Multiple, is_multiple),
];

fn is_sort(signals: &PageSignals) -> bool {
    signals.drag_items > 0 && signals.drop_targets > 0
}

fn is_multiple(signals: &PageSignals) -> bool {
    signals.checkboxes > 0
}

/// Classify the current question; anything unrecognized is single choice
pub fn classify(signals: &PageSignals) -> QuestionKind {
    RULES
        .iter()
        .find(|(_, rule)| rule(signals))
        .map(|(kind, _)| *kind)
        .unwrap_or(QuestionKind::Single)
}
