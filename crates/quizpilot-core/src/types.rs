//! Core type definitions for Quizpilot

use serde::{Deserialize, Serialize};

/// Letters offered to a provider when a question exposes none
pub const DEFAULT_LETTERS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// Question kind, in classifier priority order (sort wins over multiple,
/// multiple wins over single)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Single,
    Multiple,
    Sort,
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Multiple => write!(f, "multiple"),
            Self::Sort => write!(f, "sort"),
        }
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "single-choice" => Ok(Self::Single),
            "multiple" | "multiple-choice" | "mc" => Ok(Self::Multiple),
            "sort" | "match" => Ok(Self::Sort),
            _ => Err(format!("Invalid question kind: {}", s)),
        }
    }
}

/// Opaque token the page collaborator uses to find a selectable option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionHandle(pub usize);

/// One answer option of a single or multiple choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Uppercase letter, unique within the question
    pub letter: char,
    /// Visible option text without the letter prefix
    pub content: String,
    /// Selection handle, absent when the page could not resolve one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<OptionHandle>,
}

impl AnswerOption {
    pub fn new(letter: char, content: impl Into<String>) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            content: content.into(),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: OptionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Display string used in prompts, e.g. `"B. Paris"`
    pub fn display(&self) -> String {
        format!("{}. {}", self.letter, self.content)
    }
}

/// A positionally indexed sort item or row (1-based, valid for one cycle only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub index: usize,
    pub text: String,
}

impl SortEntry {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// A draggable item of a sort/match question
pub type SortItem = SortEntry;

/// A drop row of a sort/match question
pub type SortSlot = SortEntry;

/// Everything the scraping collaborator returns for the current question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub stem: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default)]
    pub items: Vec<SortItem>,
    #[serde(default)]
    pub slots: Vec<SortSlot>,
}

impl QuestionSnapshot {
    /// Whether the page showed no usable question
    pub fn is_blank(&self) -> bool {
        self.stem.trim().is_empty()
    }

    /// Letters of the current option set, in page order
    pub fn letters(&self) -> Vec<char> {
        self.options.iter().map(|o| o.letter).collect()
    }

    pub fn option(&self, letter: char) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.letter == letter)
    }
}

/// One row-to-item pairing of a sort answer (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortPair {
    pub row: usize,
    pub item: usize,
}

impl SortPair {
    pub fn new(row: usize, item: usize) -> Self {
        Self { row, item }
    }
}

/// A provider reply after normalization
///
/// Serializes to the same JSON body a provider is asked to produce, so a
/// normalized answer can be fed back through the normalizer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedAnswer {
    Letters {
        letters: Vec<char>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Pairs {
        pairs: Vec<SortPair>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
}

impl NormalizedAnswer {
    pub fn letters(letters: Vec<char>) -> Self {
        Self::Letters {
            letters,
            explanation: None,
        }
    }

    pub fn pairs(pairs: Vec<SortPair>) -> Self {
        Self::Pairs {
            pairs,
            explanation: None,
        }
    }

    pub fn as_letters(&self) -> Option<&[char]> {
        match self {
            Self::Letters { letters, .. } => Some(letters),
            Self::Pairs { .. } => None,
        }
    }

    pub fn as_pairs(&self) -> Option<&[SortPair]> {
        match self {
            Self::Pairs { pairs, .. } => Some(pairs),
            Self::Letters { .. } => None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            Self::Letters { explanation, .. } | Self::Pairs { explanation, .. } => {
                explanation.as_deref()
            }
        }
    }

    /// Number of letters or pairs
    pub fn len(&self) -> usize {
        match self {
            Self::Letters { letters, .. } => letters.len(),
            Self::Pairs { pairs, .. } => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Base64 image attached to a provider request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without a data-URL prefix
    pub data: String,
}

impl InlineImage {
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data: data.into(),
        }
    }

    /// Build from a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime_type = meta.strip_suffix(";base64")?;
        if payload.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Concrete model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Cerebras,
    OpenRouter,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [Self::Gemini, Self::Cerebras, Self::OpenRouter];

    /// Whether the provider accepts image input
    pub fn supports_images(&self) -> bool {
        match self {
            Self::Gemini | Self::OpenRouter => true,
            Self::Cerebras => false,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::Cerebras => "qwen-3-235b-a22b-instruct-2507",
            Self::OpenRouter => "openai/gpt-4o-mini",
        }
    }

    /// Environment variable consulted for this provider's credential
    pub fn credential_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Cerebras => "CEREBRAS_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Cerebras => write!(f, "cerebras"),
            Self::OpenRouter => write!(f, "openrouter"),
        }
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "cerebras" => Ok(Self::Cerebras),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(format!(
                "Invalid provider: {}. Use gemini, cerebras, or openrouter.",
                s
            )),
        }
    }
}

/// Provider, model, and credential chosen for one cycle
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    pub provider: ProviderId,
    pub model: String,
    pub credential: String,
}

impl ProviderChoice {
    pub fn new(provider: ProviderId, model: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            credential: credential.into(),
        }
    }
}

impl std::fmt::Debug for ProviderChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChoice")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Shape constraints shared by the prompt and the structured output schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnswerShapeHints {
    Letters {
        allowed: Vec<char>,
        multiple: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exact_count: Option<usize>,
    },
    Pairs {
        rows: usize,
        items: usize,
    },
}

impl AnswerShapeHints {
    /// Allowed letters, uppercased and deduplicated; A-F when none are known
    pub fn allowed_letters(&self) -> Vec<char> {
        match self {
            Self::Letters { allowed, .. } => {
                let mut out: Vec<char> = Vec::with_capacity(allowed.len());
                for letter in allowed.iter().map(|l| l.to_ascii_uppercase()) {
                    if !out.contains(&letter) {
                        out.push(letter);
                    }
                }
                if out.is_empty() {
                    DEFAULT_LETTERS.to_vec()
                } else {
                    out
                }
            }
            Self::Pairs { .. } => Vec::new(),
        }
    }

    pub fn min_items(&self) -> usize {
        match self {
            Self::Letters {
                exact_count: Some(n),
                ..
            } if *n > 0 => *n,
            Self::Letters { .. } | Self::Pairs { .. } => 1,
        }
    }

    pub fn max_items(&self) -> usize {
        match self {
            Self::Letters {
                exact_count: Some(n),
                ..
            } if *n > 0 => *n,
            Self::Letters { multiple: true, .. } => self.allowed_letters().len(),
            Self::Letters { .. } => 1,
            Self::Pairs { rows, .. } => (*rows).max(1),
        }
    }

    /// Item and row bounds for sort answers, clamped to at least one
    pub fn pair_bounds(&self) -> Option<(usize, usize)> {
        match self {
            Self::Pairs { rows, items } => Some(((*rows).max(1), (*items).max(1))),
            Self::Letters { .. } => None,
        }
    }

    pub fn is_pairs(&self) -> bool {
        matches!(self, Self::Pairs { .. })
    }
}

/// Quiz position as reported by the page chrome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(current: u32, total: u32) -> Self {
        Self { current, total }
    }
}

/// Grading feedback shown after a submit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Correct,
    Incorrect,
    #[default]
    Unknown,
}

/// Quiz details reported by the status query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInfo {
    pub name: String,
    pub current_question: u32,
    pub total_questions: u32,
    pub completed: bool,
}

/// Outward status: whether automation runs, and where the quiz stands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStatus {
    pub running: bool,
    pub quiz_info: QuizInfo,
}
