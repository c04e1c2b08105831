//! Applying a normalized answer to the page

use quizpilot_core::{QuestionSnapshot, SortPair, TimingConfig};
use tracing::{debug, warn};

use crate::page::QuizPage;
use crate::stop::StopHandle;

/// What happened while applying an answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuationReport {
    /// Interactions that succeeded
    pub applied: usize,
    /// Interactions that failed and were skipped
    pub failed: usize,
    /// Whether a stop request cut the application short
    pub cancelled: bool,
}

/// Drives selections and drags on a [`QuizPage`]
///
/// The stop flag is checked before every page mutation.
pub struct Actuator<'a, P: QuizPage + ?Sized> {
    page: &'a P,
    timing: &'a TimingConfig,
    stop: &'a StopHandle,
}

impl<'a, P: QuizPage + ?Sized> Actuator<'a, P> {
    pub fn new(page: &'a P, timing: &'a TimingConfig, stop: &'a StopHandle) -> Self {
        Self { page, timing, stop }
    }

    /// Select letters in the order given
    ///
    /// Single choice selects only the first letter. Multiple choice paces
    /// consecutive selections. When no letter resolves to an option handle
    /// the letters are selected by position instead (`A` is the first option).
    pub async fn apply_letters(
        &self,
        letters: &[char],
        snapshot: &QuestionSnapshot,
        multiple: bool,
    ) -> ActuationReport {
        let letters = if multiple { letters } else { &letters[..letters.len().min(1)] };
        let mut report = ActuationReport::default();

        let handles: Vec<_> = letters
            .iter()
            .filter_map(|l| snapshot.option(*l).and_then(|o| o.handle).map(|h| (*l, h)))
            .collect();

        if handles.is_empty() {
            debug!(?letters, "No option handles matched, selecting by position");
        }

        for (i, letter) in letters.iter().enumerate() {
            if i > 0 && !self.stop.wait(self.timing.selection_pacing(), self.timing.cancel_poll()).await {
                report.cancelled = true;
                return report;
            }
            if self.stop.is_stop_requested() {
                report.cancelled = true;
                return report;
            }

            let result = if handles.is_empty() {
                match position_of(*letter) {
                    Some(position) => self.page.select_option_at(position).await,
                    None => {
                        warn!(%letter, "Letter has no position on the page");
                        report.failed += 1;
                        continue;
                    }
                }
            } else {
                match handles.iter().find(|(l, _)| l == letter) {
                    Some((_, handle)) => self.page.select_option(*handle).await,
                    None => {
                        warn!(%letter, "No option handle for letter, skipping");
                        report.failed += 1;
                        continue;
                    }
                }
            };

            match result {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(%letter, error = %e, "Option selection failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Place each pair: drag and drop first, then click-click in both orders
    pub async fn apply_pairs(&self, pairs: &[SortPair]) -> ActuationReport {
        let mut report = ActuationReport::default();

        for (i, pair) in pairs.iter().enumerate() {
            if i > 0 && !self.stop.wait(self.timing.pair_pacing(), self.timing.cancel_poll()).await {
                report.cancelled = true;
                return report;
            }

            match self.place_pair(*pair).await {
                Some(true) => report.applied += 1,
                Some(false) => {
                    warn!(row = pair.row, item = pair.item, "Could not place sort item, moving on");
                    report.failed += 1;
                }
                None => {
                    report.cancelled = true;
                    return report;
                }
            }
        }
        report
    }

    /// `None` when stopped, otherwise whether the row ended up populated
    async fn place_pair(&self, pair: SortPair) -> Option<bool> {
        let SortPair { row, item } = pair;

        if self.stop.is_stop_requested() {
            return None;
        }
        match self.page.drag_item_to_slot(item, row).await {
            Ok(()) if self.wait_populated(row).await => return Some(true),
            Ok(()) => debug!(row, item, "Drop did not populate row, trying clicks"),
            Err(e) => debug!(row, item, error = %e, "Drag failed, trying clicks"),
        }

        // Slot first, then item
        if self.stop.is_stop_requested() {
            return None;
        }
        if self.click_pair(row, item, true).await && self.wait_populated(row).await {
            return Some(true);
        }

        // Item first, then slot
        if self.stop.is_stop_requested() {
            return None;
        }
        if self.click_pair(row, item, false).await && self.wait_populated(row).await {
            return Some(true);
        }
        Some(false)
    }

    async fn click_pair(&self, row: usize, item: usize, slot_first: bool) -> bool {
        let result = if slot_first {
            match self.page.click_slot(row).await {
                Ok(()) => self.page.click_item(item).await,
                Err(e) => Err(e),
            }
        } else {
            match self.page.click_item(item).await {
                Ok(()) => self.page.click_slot(row).await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = &result {
            debug!(row, item, slot_first, error = %e, "Click sequence failed");
        }
        result.is_ok()
    }

    /// Poll until the row reports populated or the drop timeout passes
    async fn wait_populated(&self, row: usize) -> bool {
        let deadline = tokio::time::Instant::now() + self.timing.drop_timeout();
        loop {
            if matches!(self.page.slot_populated(row).await, Ok(true)) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.timing.populated_poll()).await;
        }
    }
}

/// 0-based page position of a letter (`A` is 0)
fn position_of(letter: char) -> Option<usize> {
    letter
        .is_ascii_uppercase()
        .then(|| (letter as u8 - b'A') as usize)
}
