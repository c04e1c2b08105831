//! Provider replies and the canonical envelope they are normalized into

use chrono::{DateTime, Utc};
use quizpilot_core::ProviderId;
use serde::Serialize;
use serde_json::Value;

use crate::types::{ChatResponse, GeminiResponse};

/// Native reply of one provider, before normalization
#[derive(Debug, Clone)]
pub enum ProviderReply {
    Gemini(GeminiResponse),
    Cerebras(ChatResponse),
    OpenRouter(ChatResponse),
}

impl ProviderReply {
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Gemini(_) => ProviderId::Gemini,
            Self::Cerebras(_) => ProviderId::Cerebras,
            Self::OpenRouter(_) => ProviderId::OpenRouter,
        }
    }

    /// Collapse into the canonical envelope
    ///
    /// Every text fragment of the first candidate/choice is kept and joined
    /// with newlines; providers may split one JSON body across fragments.
    pub fn into_envelope(self, degraded: bool) -> ReplyEnvelope {
        let provider = self.provider();
        let (fragments, finish_reason, safety_ratings, prompt_feedback) = match self {
            Self::Gemini(response) => {
                let candidate = response.candidates.into_iter().next().unwrap_or_default();
                let fragments: Vec<String> = candidate
                    .content
                    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                    .unwrap_or_default();
                (
                    fragments,
                    candidate.finish_reason,
                    candidate.safety_ratings,
                    response.prompt_feedback,
                )
            }
            Self::Cerebras(response) | Self::OpenRouter(response) => {
                let choice = response.choices.into_iter().next().unwrap_or_default();
                let fragments = choice
                    .message
                    .map(|m| m.fragments())
                    .unwrap_or_default();
                (fragments, choice.finish_reason, Vec::new(), None)
            }
        };

        ReplyEnvelope {
            provider,
            text: fragments.join("\n"),
            fragment_count: fragments.len(),
            finish_reason,
            safety_ratings,
            prompt_feedback,
            degraded,
            received_at: Utc::now(),
        }
    }
}

/// Canonical reply: one text blob plus diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ReplyEnvelope {
    pub provider: ProviderId,
    /// All text fragments joined
    pub text: String,
    pub fragment_count: usize,
    pub finish_reason: Option<String>,
    pub safety_ratings: Vec<Value>,
    pub prompt_feedback: Option<Value>,
    /// Whether the reply came from the json-object fallback request
    pub degraded: bool,
    pub received_at: DateTime<Utc>,
}

impl ReplyEnvelope {
    /// Envelope carrying only text, as a scripted provider would return
    pub fn from_text(provider: ProviderId, text: impl Into<String>) -> Self {
        Self {
            provider,
            text: text.into(),
            fragment_count: 1,
            finish_reason: Some("STOP".to_string()),
            safety_ratings: Vec::new(),
            prompt_feedback: None,
            degraded: false,
            received_at: Utc::now(),
        }
    }

    /// First `max_chars` characters of the reply text, for failure logs
    pub fn snippet(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }

    /// Compact one-line rendering of the safety ratings
    pub fn safety_summary(&self) -> String {
        if self.safety_ratings.is_empty() {
            return "none".to_string();
        }
        serde_json::to_string(&self.safety_ratings).unwrap_or_else(|_| "unprintable".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_fragments_are_joined() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"letters\":"}, {"text": "[\"B\"]}"}]},
                "finishReason": "STOP",
                "safetyRatings": [{"category": "HARM_CATEGORY_HATE_SPEECH", "probability": "NEGLIGIBLE"}]
            }],
            "promptFeedback": {"blockReason": null}
        }))
        .unwrap();

        let envelope = ProviderReply::Gemini(response).into_envelope(false);
        assert_eq!(envelope.provider, ProviderId::Gemini);
        assert_eq!(envelope.text, "{\"letters\":\n[\"B\"]}");
        assert_eq!(envelope.fragment_count, 2);
        assert_eq!(envelope.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(envelope.safety_ratings.len(), 1);
        assert!(envelope.prompt_feedback.is_some());
    }

    #[test]
    fn test_blocked_gemini_reply_has_empty_text() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();

        let envelope = ProviderReply::Gemini(response).into_envelope(false);
        assert_eq!(envelope.text, "");
        assert_eq!(envelope.fragment_count, 0);
        assert_eq!(envelope.safety_summary(), "none");
    }

    #[test]
    fn test_chat_reply_envelope() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "{\"letters\":[\"A\"]}"}, "finish_reason": "stop"}]
        }))
        .unwrap();

        let envelope = ProviderReply::OpenRouter(response).into_envelope(true);
        assert_eq!(envelope.provider, ProviderId::OpenRouter);
        assert_eq!(envelope.text, "{\"letters\":[\"A\"]}");
        assert!(envelope.degraded);
    }

    #[test]
    fn test_snippet_counts_characters() {
        let envelope = ReplyEnvelope::from_text(ProviderId::Cerebras, "ééééé");
        assert_eq!(envelope.snippet(3), "ééé");
    }
}
