//! Deliberate wrong answers, bounded by an incorrect-answer budget

use quizpilot_core::{NormalizedAnswer, QuestionKind, QuestionSnapshot};
use rand::Rng;

/// Chance of sabotaging an eligible question
pub const SABOTAGE_PROBABILITY: f64 = 0.4;

/// Sabotage settings for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SabotagePolicy {
    pub enabled: bool,
    pub incorrect_budget: u32,
    pub probability: f64,
}

impl SabotagePolicy {
    pub fn new(enabled: bool, incorrect_budget: u32) -> Self {
        Self {
            enabled,
            incorrect_budget,
            probability: SABOTAGE_PROBABILITY,
        }
    }

    /// Decide whether to answer this question wrong on purpose
    ///
    /// Never true when disabled, when the quiz is too short to absorb the
    /// budget (`total <= budget`), or once the budget is spent.
    pub fn should_sabotage<R: Rng>(&self, total: u32, incorrect_so_far: u32, rng: &mut R) -> bool {
        if !self.enabled || total <= self.incorrect_budget || incorrect_so_far >= self.incorrect_budget {
            return false;
        }
        rng.random_bool(self.probability.clamp(0.0, 1.0))
    }
}

/// Replace a correct answer with a deliberately wrong one
///
/// Single choice switches to the first other option. Multiple choice keeps
/// the first correct letter and adds the first incorrect option, so at least
/// one correct letter stays selected. Sort answers and answers with no
/// alternative option come back unchanged.
pub fn sabotage_answer(answer: &NormalizedAnswer, kind: QuestionKind, snapshot: &QuestionSnapshot) -> NormalizedAnswer {
    let Some(correct) = answer.as_letters().filter(|l| !l.is_empty()) else {
        return answer.clone();
    };

    let wrong = snapshot
        .options
        .iter()
        .map(|o| o.letter)
        .find(|letter| !correct.contains(letter));

    match (kind, wrong) {
        (QuestionKind::Single, Some(wrong)) => NormalizedAnswer::letters(vec![wrong]),
        (QuestionKind::Multiple, Some(wrong)) => NormalizedAnswer::letters(vec![correct[0], wrong]),
        _ => answer.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizpilot_core::{AnswerOption, SortPair};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot() -> QuestionSnapshot {
        QuestionSnapshot {
            stem: "Q".to_string(),
            options: "ABCD".chars().map(|l| AnswerOption::new(l, l.to_string())).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_never_sabotages_once_budget_spent() {
        let policy = SabotagePolicy {
            enabled: true,
            incorrect_budget: 2,
            probability: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for total in 0..30 {
            for incorrect in 2..6 {
                assert!(!policy.should_sabotage(total, incorrect, &mut rng));
            }
        }
    }

    #[test]
    fn test_short_quiz_and_disabled_never_sabotage() {
        let mut rng = StdRng::seed_from_u64(1);
        let always = SabotagePolicy {
            enabled: true,
            incorrect_budget: 3,
            probability: 1.0,
        };
        assert!(!always.should_sabotage(3, 0, &mut rng));
        assert!(always.should_sabotage(4, 0, &mut rng));

        let disabled = SabotagePolicy { enabled: false, ..always };
        assert!(!disabled.should_sabotage(50, 0, &mut rng));
    }

    #[test]
    fn test_rate_is_near_forty_percent() {
        let policy = SabotagePolicy::new(true, 2);
        let mut rng = StdRng::seed_from_u64(42);
        let hits = (0..10_000)
            .filter(|_| policy.should_sabotage(20, 0, &mut rng))
            .count();
        assert!((3_500..4_500).contains(&hits), "hits: {hits}");
    }

    #[test]
    fn test_single_choice_picks_another_option() {
        let answer = NormalizedAnswer::letters(vec!['A']);
        let wrong = sabotage_answer(&answer, QuestionKind::Single, &snapshot());
        assert_eq!(wrong.as_letters(), Some(&['B'][..]));
    }

    #[test]
    fn test_multiple_choice_keeps_one_correct_letter() {
        let answer = NormalizedAnswer::letters(vec!['B', 'C']);
        let wrong = sabotage_answer(&answer, QuestionKind::Multiple, &snapshot());
        assert_eq!(wrong.as_letters(), Some(&['B', 'A'][..]));
    }

    #[test]
    fn test_no_alternative_or_sort_unchanged() {
        let all = NormalizedAnswer::letters(vec!['A', 'B', 'C', 'D']);
        assert_eq!(sabotage_answer(&all, QuestionKind::Multiple, &snapshot()), all);

        let pairs = NormalizedAnswer::pairs(vec![SortPair::new(1, 1)]);
        assert_eq!(sabotage_answer(&pairs, QuestionKind::Sort, &snapshot()), pairs);
    }
}
