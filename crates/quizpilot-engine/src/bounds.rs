//! Answer bounds checks against the current question

use quizpilot_core::{AnswerShapeHints, NormalizedAnswer, QuestionSnapshot, QuizError, Result};

/// Check that a normalized answer can be applied to this question
///
/// Letters must belong to the option set, and a detected exact count must be
/// met exactly. Pair indices must lie within the current rows and items.
/// Single choice answers with several letters pass; only the first is used.
pub fn check_bounds(
    answer: &NormalizedAnswer,
    snapshot: &QuestionSnapshot,
    hints: &AnswerShapeHints,
) -> Result<()> {
    match (answer, hints) {
        (NormalizedAnswer::Letters { letters, .. }, AnswerShapeHints::Letters { exact_count, multiple, .. }) => {
            if !snapshot.options.is_empty() {
                if let Some(stray) = letters.iter().find(|l| snapshot.option(**l).is_none()) {
                    return Err(QuizError::OutOfBounds(format!(
                        "letter {} is not one of {:?}",
                        stray,
                        snapshot.letters()
                    )));
                }
            }
            match exact_count {
                Some(n) if *multiple && letters.len() != *n => Err(QuizError::OutOfBounds(format!(
                    "expected exactly {} letters, got {}",
                    n,
                    letters.len()
                ))),
                _ => Ok(()),
            }
        }
        (NormalizedAnswer::Pairs { pairs, .. }, AnswerShapeHints::Pairs { rows, items }) => {
            match pairs
                .iter()
                .find(|p| p.row == 0 || p.row > *rows || p.item == 0 || p.item > *items)
            {
                Some(pair) => Err(QuizError::OutOfBounds(format!(
                    "pair row {} item {} outside {} rows and {} items",
                    pair.row, pair.item, rows, items
                ))),
                None => Ok(()),
            }
        }
        _ => Err(QuizError::OutOfBounds(
            "answer shape does not match the question kind".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizpilot_core::{AnswerOption, SortEntry, SortPair};

    fn five_options() -> QuestionSnapshot {
        QuestionSnapshot {
            stem: "Select the two correct answers".to_string(),
            options: "ABCDE"
                .chars()
                .map(|l| AnswerOption::new(l, format!("option {l}")))
                .collect(),
            ..Default::default()
        }
    }

    fn exact_two() -> AnswerShapeHints {
        AnswerShapeHints::Letters {
            allowed: "ABCDE".chars().collect(),
            multiple: true,
            exact_count: Some(2),
        }
    }

    #[test]
    fn test_exact_count_enforced() {
        let snapshot = five_options();
        let three = NormalizedAnswer::letters(vec!['A', 'B', 'C']);
        let err = check_bounds(&three, &snapshot, &exact_two()).unwrap_err();
        assert!(matches!(err, QuizError::OutOfBounds(_)));

        let two = NormalizedAnswer::letters(vec!['A', 'C']);
        assert!(check_bounds(&two, &snapshot, &exact_two()).is_ok());
    }

    #[test]
    fn test_unknown_letter_rejected() {
        let snapshot = five_options();
        let hints = AnswerShapeHints::Letters {
            allowed: vec![],
            multiple: false,
            exact_count: None,
        };
        let answer = NormalizedAnswer::letters(vec!['F']);
        assert!(check_bounds(&answer, &snapshot, &hints).is_err());

        let several = NormalizedAnswer::letters(vec!['A', 'B']);
        assert!(check_bounds(&several, &snapshot, &hints).is_ok());
    }

    #[test]
    fn test_pair_bounds() {
        let snapshot = QuestionSnapshot {
            stem: "Match".to_string(),
            items: (1..=3).map(|i| SortEntry::new(i, "item")).collect(),
            slots: (1..=2).map(|i| SortEntry::new(i, "row")).collect(),
            ..Default::default()
        };
        let hints = AnswerShapeHints::Pairs { rows: 2, items: 3 };

        let ok = NormalizedAnswer::pairs(vec![SortPair::new(1, 3), SortPair::new(2, 1)]);
        assert!(check_bounds(&ok, &snapshot, &hints).is_ok());

        let bad_row = NormalizedAnswer::pairs(vec![SortPair::new(3, 1)]);
        assert!(check_bounds(&bad_row, &snapshot, &hints).is_err());

        let bad_item = NormalizedAnswer::pairs(vec![SortPair::new(1, 4)]);
        assert!(check_bounds(&bad_item, &snapshot, &hints).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let answer = NormalizedAnswer::letters(vec!['A']);
        let hints = AnswerShapeHints::Pairs { rows: 1, items: 1 };
        assert!(check_bounds(&answer, &QuestionSnapshot::default(), &hints).is_err());
    }
}
