//! Configuration management for Quizpilot
//!
//! Settings are loaded from `.quizpilot/config.toml` in a working directory.
//! Provider credentials may live in the file or in the environment
//! (`GEMINI_API_KEY`, `CEREBRAS_API_KEY`, `OPENROUTER_API_KEY`); a value from
//! the environment only fills a credential the file left blank.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::ProviderId;
use crate::{QuizError, Result};

/// Provider selection as configured by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    #[default]
    Gemini,
    Cerebras,
    OpenRouter,
    /// Route media questions and text-only questions to different providers
    Hybrid,
}

impl ProviderSelection {
    /// Concrete provider, or `None` for hybrid
    pub fn concrete(&self) -> Option<ProviderId> {
        match self {
            Self::Gemini => Some(ProviderId::Gemini),
            Self::Cerebras => Some(ProviderId::Cerebras),
            Self::OpenRouter => Some(ProviderId::OpenRouter),
            Self::Hybrid => None,
        }
    }
}

impl std::fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.concrete() {
            Some(provider) => write!(f, "{}", provider),
            None => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for ProviderSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("hybrid") {
            return Ok(Self::Hybrid);
        }
        match s.parse::<ProviderId>()? {
            ProviderId::Gemini => Ok(Self::Gemini),
            ProviderId::Cerebras => Ok(Self::Cerebras),
            ProviderId::OpenRouter => Ok(Self::OpenRouter),
        }
    }
}

/// API keys, one per provider
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub cerebras: Option<String>,
    #[serde(default)]
    pub openrouter: Option<String>,
}

impl Credentials {
    /// Credential for a provider; blank values count as missing
    pub fn get(&self, provider: ProviderId) -> Option<&str> {
        let value = match provider {
            ProviderId::Gemini => self.gemini.as_deref(),
            ProviderId::Cerebras => self.cerebras.as_deref(),
            ProviderId::OpenRouter => self.openrouter.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, provider: ProviderId, value: impl Into<String>) {
        let slot = match provider {
            ProviderId::Gemini => &mut self.gemini,
            ProviderId::Cerebras => &mut self.cerebras,
            ProviderId::OpenRouter => &mut self.openrouter,
        };
        *slot = Some(value.into());
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |provider| self.get(provider).map(|_| "<set>");
        f.debug_struct("Credentials")
            .field("gemini", &mask(ProviderId::Gemini))
            .field("cerebras", &mask(ProviderId::Cerebras))
            .field("openrouter", &mask(ProviderId::OpenRouter))
            .finish()
    }
}

/// Routing targets used when the provider selection is hybrid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_media_provider")]
    pub media_provider: ProviderId,

    #[serde(default = "default_media_model")]
    pub media_model: String,

    #[serde(default = "default_text_provider")]
    pub text_provider: ProviderId,

    #[serde(default = "default_text_model")]
    pub text_model: String,
}

/// Pacing and polling intervals, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause between selections of a multiple-choice answer
    #[serde(default = "default_selection_pacing_ms")]
    pub selection_pacing_ms: u64,

    /// Wait before retrying after an empty answer
    #[serde(default = "default_empty_retry_ms")]
    pub empty_retry_ms: u64,

    /// Wait before retrying after a failed cycle
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Wait after submitting before reading feedback and advancing
    #[serde(default = "default_post_submit_ms")]
    pub post_submit_ms: u64,

    /// How long a drag-and-drop gets to populate its row
    #[serde(default = "default_drop_timeout_ms")]
    pub drop_timeout_ms: u64,

    /// Polling interval while waiting for a row to populate
    #[serde(default = "default_populated_poll_ms")]
    pub populated_poll_ms: u64,

    /// Polling interval of the cancellable delay
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,

    /// Pause between sort pairs
    #[serde(default = "default_pair_pacing_ms")]
    pub pair_pacing_ms: u64,
}

impl TimingConfig {
    pub fn selection_pacing(&self) -> Duration {
        Duration::from_millis(self.selection_pacing_ms)
    }

    pub fn empty_retry(&self) -> Duration {
        Duration::from_millis(self.empty_retry_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn post_submit(&self) -> Duration {
        Duration::from_millis(self.post_submit_ms)
    }

    pub fn drop_timeout(&self) -> Duration {
        Duration::from_millis(self.drop_timeout_ms)
    }

    pub fn populated_poll(&self) -> Duration {
        Duration::from_millis(self.populated_poll_ms.max(1))
    }

    pub fn cancel_poll(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_ms.max(1))
    }

    pub fn pair_pacing(&self) -> Duration {
        Duration::from_millis(self.pair_pacing_ms)
    }
}

/// Base URLs of the provider APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_gemini_base")]
    pub gemini: String,

    #[serde(default = "default_cerebras_base")]
    pub cerebras: String,

    #[serde(default = "default_openrouter_base")]
    pub openrouter: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    pub fn base_url(&self, provider: ProviderId) -> &str {
        match provider {
            ProviderId::Gemini => &self.gemini,
            ProviderId::Cerebras => &self.cerebras,
            ProviderId::OpenRouter => &self.openrouter,
        }
    }

    /// Point every provider at the same base URL (used against fake servers)
    pub fn all_at(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            gemini: base.clone(),
            cerebras: base.clone(),
            openrouter: base,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User settings, read-only to the engine
///
/// Loaded from `.quizpilot/config.toml` in the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSelection,

    /// Model name; ignored in hybrid mode
    #[serde(default = "default_model")]
    pub model: String,

    /// Seconds to wait after selecting an answer, before submitting
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Deliberately answer some questions wrong
    #[serde(default = "default_true")]
    pub sabotage: bool,

    /// Target number of deliberately wrong answers per quiz
    #[serde(default = "default_incorrect_budget")]
    pub incorrect_budget: u32,

    /// Consecutive unsuccessful cycles before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Capture question media and send it to image-capable providers
    #[serde(default = "default_true")]
    pub process_images: bool,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub endpoints: EndpointConfig,
}

// Default value providers
fn default_model() -> String {
    ProviderId::Gemini.default_model().to_string()
}

/// Longest accepted post-selection delay (one hour)
pub const MAX_DELAY_SECS: f64 = 3600.0;

fn default_delay_secs() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_incorrect_budget() -> u32 {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_media_provider() -> ProviderId {
    ProviderId::Gemini
}

fn default_media_model() -> String {
    ProviderId::Gemini.default_model().to_string()
}

fn default_text_provider() -> ProviderId {
    ProviderId::Cerebras
}

fn default_text_model() -> String {
    ProviderId::Cerebras.default_model().to_string()
}

fn default_selection_pacing_ms() -> u64 {
    700
}

fn default_empty_retry_ms() -> u64 {
    1000
}

fn default_error_backoff_ms() -> u64 {
    2000
}

fn default_post_submit_ms() -> u64 {
    1000
}

fn default_drop_timeout_ms() -> u64 {
    1000
}

fn default_populated_poll_ms() -> u64 {
    40
}

fn default_cancel_poll_ms() -> u64 {
    50
}

fn default_pair_pacing_ms() -> u64 {
    120
}

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_cerebras_base() -> String {
    "https://api.cerebras.ai".to_string()
}

fn default_openrouter_base() -> String {
    "https://openrouter.ai/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Settings {
    /// Load configuration from `.quizpilot/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".quizpilot/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Self = toml::from_str(&content).map_err(|e| {
                QuizError::Config(format!("Failed to parse config file: {}", e))
            })?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.quizpilot/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".quizpilot");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| QuizError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Fill blank credentials from the provider environment variables
    pub fn with_env_credentials(mut self) -> Self {
        for provider in ProviderId::ALL {
            if self.credentials.get(provider).is_some() {
                continue;
            }
            if let Ok(value) = std::env::var(provider.credential_env()) {
                if !value.trim().is_empty() {
                    tracing::debug!(%provider, "Using credential from environment");
                    self.credentials.set(provider, value);
                }
            }
        }
        self
    }

    /// Credential for a provider, if configured and non-blank
    pub fn credential_for(&self, provider: ProviderId) -> Option<&str> {
        self.credentials.get(provider)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(QuizError::Config(format!(
                "delay_secs must be a non-negative number, got {}",
                self.delay_secs
            )));
        }
        if self.delay_secs > MAX_DELAY_SECS {
            return Err(QuizError::Config(format!(
                "delay_secs must be at most {}, got {}",
                MAX_DELAY_SECS, self.delay_secs
            )));
        }
        if self.max_attempts == 0 {
            return Err(QuizError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Post-selection delay, clamped to `0..=MAX_DELAY_SECS`
    pub fn delay(&self) -> Duration {
        let secs = if self.delay_secs.is_nan() {
            0.0
        } else {
            self.delay_secs.clamp(0.0, MAX_DELAY_SECS)
        };
        Duration::try_from_secs_f64(secs).unwrap_or_default()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderSelection::default(),
            model: default_model(),
            delay_secs: default_delay_secs(),
            sabotage: true,
            incorrect_budget: default_incorrect_budget(),
            max_attempts: default_max_attempts(),
            process_images: true,
            credentials: Credentials::default(),
            hybrid: HybridConfig::default(),
            timing: TimingConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            media_provider: default_media_provider(),
            media_model: default_media_model(),
            text_provider: default_text_provider(),
            text_model: default_text_model(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            selection_pacing_ms: default_selection_pacing_ms(),
            empty_retry_ms: default_empty_retry_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            post_submit_ms: default_post_submit_ms(),
            drop_timeout_ms: default_drop_timeout_ms(),
            populated_poll_ms: default_populated_poll_ms(),
            cancel_poll_ms: default_cancel_poll_ms(),
            pair_pacing_ms: default_pair_pacing_ms(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            gemini: default_gemini_base(),
            cerebras: default_cerebras_base(),
            openrouter: default_openrouter_base(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}
