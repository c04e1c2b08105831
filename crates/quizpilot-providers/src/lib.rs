//! # quizpilot-providers
//!
//! Model provider adapters for Quizpilot.
//!
//! Each adapter turns a provider-agnostic [`ProviderRequest`] into the native
//! request of one provider and collapses the native reply into a canonical
//! [`ReplyEnvelope`]:
//! - Gemini: `generateContent` with a `responseSchema`
//! - Cerebras / OpenRouter: chat completions with a strict `json_schema`
//!
//! When a provider refuses the strict schema, the adapter re-issues exactly
//! one request in a looser JSON mode before failing.

mod envelope;
mod gemini;
mod http;
mod mock;
mod openai_compat;
mod schema;
mod types;

use async_trait::async_trait;
use quizpilot_core::{
    AnswerShapeHints, EndpointConfig, InlineImage, ProviderChoice, ProviderId, QuizError, Result,
};
use std::time::Duration;

pub use envelope::{ProviderReply, ReplyEnvelope};
pub use mock::{MockProvider, RecordedCall};
pub use schema::{answer_schema, schema_name, SchemaDialect};
pub use types::*;

use openai_compat::Flavor;

/// Provider-agnostic request for one question
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub prompt: String,
    pub images: Vec<InlineImage>,
    pub hints: AnswerShapeHints,
}

/// The network boundary: call a provider or check that it is reachable
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send one request and return the normalized reply envelope
    async fn call(&self, choice: &ProviderChoice, request: &ProviderRequest) -> Result<ReplyEnvelope>;

    /// Check that the credential and model are accepted
    async fn probe(&self, choice: &ProviderChoice) -> Result<bool>;
}

/// Provider client that talks to the real HTTP APIs
#[derive(Debug, Clone)]
pub struct HttpProviders {
    http: reqwest::Client,
    endpoints: EndpointConfig,
}

impl HttpProviders {
    pub fn new(endpoints: EndpointConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs.max(1)))
            .build()
            .map_err(|e| QuizError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }
}

#[async_trait]
impl ProviderClient for HttpProviders {
    async fn call(&self, choice: &ProviderChoice, request: &ProviderRequest) -> Result<ReplyEnvelope> {
        let base = self.endpoints.base_url(choice.provider);
        match choice.provider {
            ProviderId::Gemini => gemini::call(&self.http, base, choice, request).await,
            ProviderId::Cerebras => {
                openai_compat::call(Flavor::Cerebras, &self.http, base, choice, request).await
            }
            ProviderId::OpenRouter => {
                openai_compat::call(Flavor::OpenRouter, &self.http, base, choice, request).await
            }
        }
    }

    async fn probe(&self, choice: &ProviderChoice) -> Result<bool> {
        let base = self.endpoints.base_url(choice.provider);
        match choice.provider {
            ProviderId::Gemini => gemini::probe(&self.http, base, choice).await,
            ProviderId::Cerebras => {
                openai_compat::probe(Flavor::Cerebras, &self.http, base, choice).await
            }
            ProviderId::OpenRouter => {
                openai_compat::probe(Flavor::OpenRouter, &self.http, base, choice).await
            }
        }
    }
}
