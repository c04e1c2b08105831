//! Collaborator capabilities consumed by the engine
//!
//! The engine never touches a page, a settings store, or a screen directly.
//! Everything it needs comes through these traits so it can run against a
//! real browser bridge, a scripted fixture, or a test double.

use async_trait::async_trait;
use quizpilot_core::{
    Feedback, InlineImage, OptionHandle, Progress, QuestionKind, QuestionSnapshot, Result,
    Settings,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structural counts the classifier decides on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSignals {
    pub drag_items: usize,
    pub drop_targets: usize,
    pub checkboxes: usize,
}

/// The quiz page: scraping, quiz chrome status, and interactions
///
/// Sort items and slots are addressed by the 1-based indices of the current
/// snapshot.
#[async_trait]
pub trait QuizPage: Send + Sync {
    async fn signals(&self) -> Result<PageSignals>;

    /// Snapshot of the current question, scraped for the given kind
    async fn question_snapshot(&self, kind: QuestionKind) -> Result<QuestionSnapshot>;

    async fn has_inline_media(&self) -> Result<bool>;

    async fn progress(&self) -> Result<Progress>;

    async fn is_completed(&self) -> Result<bool>;

    async fn quiz_name(&self) -> Result<String>;

    async fn select_option(&self, handle: OptionHandle) -> Result<()>;

    /// Select the option at a 0-based position in page order
    async fn select_option_at(&self, position: usize) -> Result<()>;

    async fn drag_item_to_slot(&self, item: usize, slot: usize) -> Result<()>;

    async fn click_item(&self, item: usize) -> Result<()>;

    async fn click_slot(&self, slot: usize) -> Result<()>;

    async fn slot_populated(&self, slot: usize) -> Result<bool>;

    async fn submit(&self) -> Result<()>;

    async fn feedback(&self) -> Result<Feedback>;

    async fn advance(&self) -> Result<()>;
}

/// Where settings come from; read once per run
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> Result<Settings>;
}

/// Fixed in-memory settings
#[derive(Debug, Clone)]
pub struct StaticSettings(pub Settings);

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn load(&self) -> Result<Settings> {
        Ok(self.0.clone())
    }
}

/// Settings read from `.quizpilot/config.toml` under a root, with
/// environment credentials filling blanks
#[derive(Debug, Clone)]
pub struct FileSettings {
    root: PathBuf,
}

impl FileSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SettingsSource for FileSettings {
    async fn load(&self) -> Result<Settings> {
        Ok(Settings::load_or_default(&self.root)?.with_env_credentials())
    }
}

/// Optional screen capture; `None` means nothing was captured
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> Result<Option<InlineImage>>;
}

/// Capture that always returns the same image
#[derive(Debug, Clone)]
pub struct FixedCapture(pub InlineImage);

#[async_trait]
impl ScreenCapture for FixedCapture {
    async fn capture(&self) -> Result<Option<InlineImage>> {
        Ok(Some(self.0.clone()))
    }
}
