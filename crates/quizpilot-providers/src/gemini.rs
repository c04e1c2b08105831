//! Gemini adapter (generateContent, v1beta)

use quizpilot_core::{ProviderChoice, ProviderId, Result};
use tracing::{debug, instrument, warn};

use crate::envelope::{ProviderReply, ReplyEnvelope};
use crate::http::{join_url, send, HttpOutcome};
use crate::schema::{answer_schema, SchemaDialect};
use crate::types::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse,
    ThinkingConfig,
};
use crate::ProviderRequest;

const TEMPERATURE: f32 = 0.2;
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Build a generateContent request; `strict` attaches the response schema
pub(crate) fn build_request(model: &str, request: &ProviderRequest, strict: bool) -> GeminiRequest {
    // Images first, then the prompt text
    let mut parts: Vec<GeminiPart> = request.images.iter().map(GeminiPart::image).collect();
    parts.push(GeminiPart::text(&request.prompt));

    // Thinking can only be disabled on the flash models
    let thinking_config = model
        .starts_with("gemini-2.5-flash")
        .then_some(ThinkingConfig { thinking_budget: 0 });

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts,
        }],
        generation_config: GeminiGenerationConfig {
            temperature: TEMPERATURE,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: "application/json".to_string(),
            response_schema: strict.then(|| answer_schema(&request.hints, SchemaDialect::Gemini)),
            thinking_config,
        },
    }
}

/// Whether an error response means the schema itself was refused
pub(crate) fn is_schema_rejection(outcome: &HttpOutcome) -> bool {
    if outcome.status != 400 {
        return false;
    }
    // Covers responseSchema, response_schema, and generic schema errors
    outcome.error_message().to_lowercase().contains("schema")
}

fn generate_url(base: &str, model: &str) -> String {
    join_url(base, &format!("v1beta/models/{}:generateContent", model))
}

/// Call generateContent, retrying once without the schema if it is refused
#[instrument(skip_all, fields(model = %choice.model, images = request.images.len()))]
pub(crate) async fn call(
    http: &reqwest::Client,
    base: &str,
    choice: &ProviderChoice,
    request: &ProviderRequest,
) -> Result<ReplyEnvelope> {
    let url = generate_url(base, &choice.model);
    let post = |strict: bool| {
        http.post(&url)
            .query(&[("key", choice.credential.as_str())])
            .json(&build_request(&choice.model, request, strict))
    };

    debug!("Sending structured request to Gemini");
    let mut outcome = send(ProviderId::Gemini, post(true)).await?;
    let mut degraded = false;

    if !outcome.is_success() && is_schema_rejection(&outcome) {
        warn!(
            status = outcome.status,
            "Gemini rejected the response schema, retrying in plain JSON mode"
        );
        outcome = send(ProviderId::Gemini, post(false)).await?;
        degraded = true;
    }

    if !outcome.is_success() {
        return Err(if degraded {
            outcome.into_degraded_error(ProviderId::Gemini)
        } else {
            outcome.into_api_error(ProviderId::Gemini)
        });
    }

    let response: GeminiResponse = outcome.parse(ProviderId::Gemini)?;
    Ok(ProviderReply::Gemini(response).into_envelope(degraded))
}

/// Check the key and model with a model metadata request
pub(crate) async fn probe(http: &reqwest::Client, base: &str, choice: &ProviderChoice) -> Result<bool> {
    let url = join_url(base, &format!("v1beta/models/{}", choice.model));
    let outcome = send(
        ProviderId::Gemini,
        http.get(&url).query(&[("key", choice.credential.as_str())]),
    )
    .await?;

    if !outcome.is_success() {
        warn!(status = outcome.status, message = %outcome.error_message(), "Gemini probe failed");
    }
    Ok(outcome.is_success())
}
