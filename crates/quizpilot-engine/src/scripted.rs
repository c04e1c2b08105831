//! A quiz page backed by a JSON fixture
//!
//! `ScriptedQuiz` answers the [`QuizPage`] capability from a list of
//! questions with known correct answers. It grades submissions, records every
//! interaction, and shows a completion screen after the last question. Used
//! by the `simulate` command and by the engine's own tests.

use async_trait::async_trait;
use quizpilot_core::{
    AnswerOption, Feedback, OptionHandle, Progress, QuestionKind, QuestionSnapshot, QuizError,
    Result, SortEntry, SortPair,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::page::{PageSignals, QuizPage};

/// One fixture question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedQuestion {
    pub kind: QuestionKind,
    pub stem: String,
    /// Option contents, lettered A, B, C... in order
    #[serde(default)]
    pub options: Vec<String>,
    /// Correct letters for single/multiple choice
    #[serde(default)]
    pub correct: Vec<char>,
    /// Sort items, indexed from 1
    #[serde(default)]
    pub items: Vec<String>,
    /// Sort rows, indexed from 1
    #[serde(default)]
    pub rows: Vec<String>,
    /// Correct row/item pairs for sort questions
    #[serde(default)]
    pub pairs: Vec<SortPair>,
    /// Whether the question shows an inline image
    #[serde(default)]
    pub media: bool,
}

/// A whole fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizScript {
    pub name: String,
    pub questions: Vec<ScriptedQuestion>,
}

/// Interactions recorded by the scripted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Select(char),
    Drag { item: usize, slot: usize },
    ClickItem(usize),
    ClickSlot(usize),
    Submit,
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingClick {
    Item(usize),
    Slot(usize),
}

#[derive(Debug, Default)]
struct QuizState {
    index: usize,
    selected: Vec<char>,
    placed: Vec<Option<usize>>,
    pending: Option<PendingClick>,
    feedback: Option<Feedback>,
    log: Vec<Interaction>,
    results: Vec<Feedback>,
    submitted_answers: Vec<Vec<char>>,
}

#[derive(Debug)]
struct Inner {
    script: QuizScript,
    option_handles: bool,
    drag_works: bool,
    state: Mutex<QuizState>,
}

/// Scripted quiz page; clones share state
#[derive(Debug, Clone)]
pub struct ScriptedQuiz {
    inner: Arc<Inner>,
}

impl ScriptedQuiz {
    pub fn new(script: QuizScript) -> Self {
        Self::build(script, true, true)
    }

    fn build(script: QuizScript, option_handles: bool, drag_works: bool) -> Self {
        let state = QuizState {
            placed: vec![None; script.questions.first().map_or(0, |q| q.rows.len())],
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                script,
                option_handles,
                drag_works,
                state: Mutex::new(state),
            }),
        }
    }

    /// Load a fixture from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let script: QuizScript = serde_json::from_str(&content)?;
        Ok(Self::new(script))
    }

    /// Options come without selection handles, forcing positional selection
    pub fn without_option_handles(self) -> Self {
        let script = self.inner.script.clone();
        Self::build(script, false, self.inner.drag_works)
    }

    /// Drag and drop never populates a row; only click sequences work
    pub fn with_broken_drag(self) -> Self {
        let script = self.inner.script.clone();
        Self::build(script, self.inner.option_handles, false)
    }

    fn state(&self) -> Result<MutexGuard<'_, QuizState>> {
        self.inner
            .state
            .lock()
            .map_err(|_| QuizError::Page("Scripted quiz state poisoned".to_string()))
    }

    fn current<'s>(&'s self, state: &QuizState) -> Option<&'s ScriptedQuestion> {
        self.inner.script.questions.get(state.index)
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.state().map(|s| s.log.clone()).unwrap_or_default()
    }

    /// Grading result of every submission so far
    pub fn results(&self) -> Vec<Feedback> {
        self.state().map(|s| s.results.clone()).unwrap_or_default()
    }

    /// Letters selected at each submission (empty for sort questions)
    pub fn submitted_answers(&self) -> Vec<Vec<char>> {
        self.state()
            .map(|s| s.submitted_answers.clone())
            .unwrap_or_default()
    }

    pub fn submissions(&self) -> usize {
        self.results().len()
    }

    /// Index of the question on screen
    pub fn position(&self) -> usize {
        self.state().map(|s| s.index).unwrap_or(0)
    }

    fn select_letter(&self, letter: char) -> Result<()> {
        let mut state = self.state()?;
        let question = self
            .current(&state)
            .ok_or_else(|| QuizError::Actuation("No question on screen".to_string()))?;
        let position = (letter as u32).wrapping_sub('A' as u32) as usize;
        if position >= question.options.len() {
            return Err(QuizError::Actuation(format!("No option {}", letter)));
        }

        match question.kind {
            QuestionKind::Multiple => {
                if let Some(i) = state.selected.iter().position(|l| *l == letter) {
                    state.selected.remove(i);
                } else {
                    state.selected.push(letter);
                }
            }
            QuestionKind::Single | QuestionKind::Sort => state.selected = vec![letter],
        }
        state.log.push(Interaction::Select(letter));
        Ok(())
    }

    fn place(state: &mut QuizState, slot: usize, item: usize) {
        if let Some(entry) = state.placed.get_mut(slot.saturating_sub(1)) {
            *entry = Some(item);
        }
    }

    fn check_sort_index(&self, state: &QuizState, index: usize, of_items: bool) -> Result<()> {
        let question = self
            .current(state)
            .ok_or_else(|| QuizError::Actuation("No question on screen".to_string()))?;
        let len = if of_items { question.items.len() } else { question.rows.len() };
        if index == 0 || index > len {
            return Err(QuizError::Actuation(format!(
                "{} {} does not exist",
                if of_items { "Item" } else { "Row" },
                index
            )));
        }
        Ok(())
    }
}

fn letter_at(position: usize) -> char {
    (b'A' + position as u8) as char
}

#[async_trait]
impl QuizPage for ScriptedQuiz {
    async fn signals(&self) -> Result<PageSignals> {
        let state = self.state()?;
        Ok(match self.current(&state) {
            Some(q) if q.kind == QuestionKind::Sort => PageSignals {
                drag_items: q.items.len(),
                drop_targets: q.rows.len(),
                checkboxes: 0,
            },
            Some(q) if q.kind == QuestionKind::Multiple => PageSignals {
                checkboxes: q.options.len(),
                ..Default::default()
            },
            _ => PageSignals::default(),
        })
    }

    async fn question_snapshot(&self, _kind: QuestionKind) -> Result<QuestionSnapshot> {
        let state = self.state()?;
        let Some(question) = self.current(&state) else {
            return Ok(QuestionSnapshot::default());
        };

        let options = question
            .options
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let option = AnswerOption::new(letter_at(i), content.as_str());
                if self.inner.option_handles {
                    option.with_handle(OptionHandle(i))
                } else {
                    option
                }
            })
            .collect();
        let entries = |texts: &[String]| -> Vec<SortEntry> {
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| SortEntry::new(i + 1, text.as_str()))
                .collect()
        };

        Ok(QuestionSnapshot {
            stem: question.stem.clone(),
            options,
            items: entries(&question.items),
            slots: entries(&question.rows),
        })
    }

    async fn has_inline_media(&self) -> Result<bool> {
        let state = self.state()?;
        Ok(self.current(&state).is_some_and(|q| q.media))
    }

    async fn progress(&self) -> Result<Progress> {
        let state = self.state()?;
        let total = self.inner.script.questions.len() as u32;
        Ok(Progress::new((state.index as u32 + 1).min(total), total))
    }

    async fn is_completed(&self) -> Result<bool> {
        let state = self.state()?;
        Ok(state.index >= self.inner.script.questions.len())
    }

    async fn quiz_name(&self) -> Result<String> {
        Ok(self.inner.script.name.clone())
    }

    async fn select_option(&self, handle: OptionHandle) -> Result<()> {
        self.select_letter(letter_at(handle.0))
    }

    async fn select_option_at(&self, position: usize) -> Result<()> {
        self.select_letter(letter_at(position))
    }

    async fn drag_item_to_slot(&self, item: usize, slot: usize) -> Result<()> {
        let mut state = self.state()?;
        self.check_sort_index(&state, item, true)?;
        self.check_sort_index(&state, slot, false)?;
        state.log.push(Interaction::Drag { item, slot });
        if self.inner.drag_works {
            Self::place(&mut state, slot, item);
        }
        Ok(())
    }

    async fn click_item(&self, item: usize) -> Result<()> {
        let mut state = self.state()?;
        self.check_sort_index(&state, item, true)?;
        state.log.push(Interaction::ClickItem(item));
        match state.pending.take() {
            Some(PendingClick::Slot(slot)) => Self::place(&mut state, slot, item),
            _ => state.pending = Some(PendingClick::Item(item)),
        }
        Ok(())
    }

    async fn click_slot(&self, slot: usize) -> Result<()> {
        let mut state = self.state()?;
        self.check_sort_index(&state, slot, false)?;
        state.log.push(Interaction::ClickSlot(slot));
        match state.pending.take() {
            Some(PendingClick::Item(item)) => Self::place(&mut state, slot, item),
            _ => state.pending = Some(PendingClick::Slot(slot)),
        }
        Ok(())
    }

    async fn slot_populated(&self, slot: usize) -> Result<bool> {
        let state = self.state()?;
        Ok(slot > 0 && matches!(state.placed.get(slot - 1), Some(Some(_))))
    }

    async fn submit(&self) -> Result<()> {
        let mut state = self.state()?;
        let question = self
            .current(&state)
            .ok_or_else(|| QuizError::Actuation("Nothing to submit".to_string()))?;

        let correct = match question.kind {
            QuestionKind::Sort => question
                .pairs
                .iter()
                .all(|p| p.row > 0 && state.placed.get(p.row - 1).copied().flatten() == Some(p.item)),
            QuestionKind::Single | QuestionKind::Multiple => {
                let mut given = state.selected.clone();
                let mut expected = question.correct.clone();
                given.sort_unstable();
                expected.sort_unstable();
                !given.is_empty() && given == expected
            }
        };

        let feedback = if correct { Feedback::Correct } else { Feedback::Incorrect };
        let selected = state.selected.clone();
        state.feedback = Some(feedback);
        state.results.push(feedback);
        state.submitted_answers.push(selected);
        state.log.push(Interaction::Submit);
        Ok(())
    }

    async fn feedback(&self) -> Result<Feedback> {
        Ok(self.state()?.feedback.unwrap_or_default())
    }

    async fn advance(&self) -> Result<()> {
        let mut state = self.state()?;
        state.index += 1;
        state.selected.clear();
        state.pending = None;
        state.feedback = None;
        state.placed = vec![None; self.current(&state).map_or(0, |q| q.rows.len())];
        state.log.push(Interaction::Advance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> QuizScript {
        serde_json::from_str(
            r#"{
                "name": "Sample",
                "questions": [
                    {"kind": "multiple", "stem": "Pick primes", "options": ["2", "4", "5"], "correct": ["A", "C"]},
                    {"kind": "sort", "stem": "Match", "items": ["Oak", "Salmon"], "rows": ["Fish", "Tree"],
                     "pairs": [{"row": 1, "item": 2}, {"row": 2, "item": 1}]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_grades_multiple_choice_regardless_of_order() {
        let quiz = ScriptedQuiz::new(script());
        assert_eq!(quiz.signals().await.unwrap().checkboxes, 3);

        quiz.select_option(OptionHandle(2)).await.unwrap();
        quiz.select_option_at(0).await.unwrap();
        quiz.submit().await.unwrap();
        assert_eq!(quiz.feedback().await.unwrap(), Feedback::Correct);
        assert_eq!(quiz.submitted_answers(), vec![vec!['C', 'A']]);
    }

    #[tokio::test]
    async fn test_sort_question_clicks_pair_in_either_order() {
        let quiz = ScriptedQuiz::new(script());
        quiz.advance().await.unwrap();

        let snapshot = quiz.question_snapshot(QuestionKind::Sort).await.unwrap();
        assert_eq!(snapshot.slots[0], SortEntry::new(1, "Fish"));

        quiz.click_slot(1).await.unwrap();
        quiz.click_item(2).await.unwrap();
        quiz.click_item(1).await.unwrap();
        quiz.click_slot(2).await.unwrap();
        assert!(quiz.slot_populated(1).await.unwrap());
        assert!(quiz.slot_populated(2).await.unwrap());

        quiz.submit().await.unwrap();
        assert_eq!(quiz.results(), vec![Feedback::Correct]);
    }

    #[tokio::test]
    async fn test_completion_after_last_question() {
        let quiz = ScriptedQuiz::new(script());
        assert_eq!(quiz.progress().await.unwrap(), Progress::new(1, 2));
        quiz.advance().await.unwrap();
        quiz.advance().await.unwrap();

        assert!(quiz.is_completed().await.unwrap());
        assert!(quiz.question_snapshot(QuestionKind::Single).await.unwrap().is_blank());
        assert_eq!(quiz.progress().await.unwrap(), Progress::new(2, 2));
        assert!(quiz.submit().await.is_err());
    }

    #[tokio::test]
    async fn test_broken_drag_leaves_row_empty() {
        let quiz = ScriptedQuiz::new(script()).with_broken_drag();
        quiz.advance().await.unwrap();
        quiz.drag_item_to_slot(1, 2).await.unwrap();
        assert!(!quiz.slot_populated(2).await.unwrap());
        assert!(quiz.drag_item_to_slot(3, 1).await.is_err());
    }
}
