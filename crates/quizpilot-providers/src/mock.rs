//! Scripted provider client for tests and offline runs

use async_trait::async_trait;
use quizpilot_core::{AnswerShapeHints, ProviderChoice, ProviderId, QuizError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{ProviderClient, ProviderRequest, ReplyEnvelope};

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Transport(String),
    Api { status: u16, body: String },
}

impl Scripted {
    fn into_result(self, provider: ProviderId) -> Result<ReplyEnvelope> {
        match self {
            Self::Text(text) => Ok(ReplyEnvelope::from_text(provider, text)),
            Self::Transport(message) => Err(QuizError::Transport(message)),
            Self::Api { status, body } => Err(QuizError::Api {
                provider,
                status,
                body,
            }),
        }
    }
}

/// One call seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub provider: ProviderId,
    pub model: String,
    pub prompt: String,
    pub image_count: usize,
    pub hints: AnswerShapeHints,
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Scripted>,
    calls: Vec<RecordedCall>,
}

/// Provider client that replays scripted replies in order
///
/// Clones share the same script and call log, so a test can keep a handle
/// after giving the client to a controller.
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    fallback: Option<String>,
    latency: Duration,
    probe_ok: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            fallback: None,
            latency: Duration::ZERO,
            probe_ok: true,
        }
    }

    /// Queue a text reply
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()));
        self
    }

    /// Queue a transport failure
    pub fn with_transport_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Transport(message.into()));
        self
    }

    /// Queue an API error response
    pub fn with_api_error(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Scripted::Api {
            status,
            body: body.into(),
        });
        self
    }

    /// Reply used once the queue is exhausted
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Simulated network latency per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_probe_result(mut self, ok: bool) -> Self {
        self.probe_ok = ok;
        self
    }

    fn push(&self, scripted: Scripted) {
        if let Ok(mut state) = self.state.lock() {
            state.queue.push_back(scripted);
        }
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().map(|state| state.calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn call(&self, choice: &ProviderChoice, request: &ProviderRequest) -> Result<ReplyEnvelope> {
        let next = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| QuizError::Other("Mock provider state poisoned".to_string()))?;
            state.calls.push(RecordedCall {
                provider: choice.provider,
                model: choice.model.clone(),
                prompt: request.prompt.clone(),
                image_count: request.images.len(),
                hints: request.hints.clone(),
            });
            state
                .queue
                .pop_front()
                .or_else(|| self.fallback.clone().map(Scripted::Text))
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match next {
            Some(scripted) => scripted.into_result(choice.provider),
            None => Err(QuizError::Transport(
                "No scripted reply left in mock provider".to_string(),
            )),
        }
    }

    async fn probe(&self, _choice: &ProviderChoice) -> Result<bool> {
        Ok(self.probe_ok)
    }
}
