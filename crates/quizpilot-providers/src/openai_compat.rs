//! OpenAI-compatible chat completion adapters (Cerebras, OpenRouter)

use quizpilot_core::{ProviderChoice, ProviderId, Result};
use tracing::{debug, instrument, warn};

use crate::envelope::{ProviderReply, ReplyEnvelope};
use crate::http::{join_url, send, HttpOutcome};
use crate::schema::{answer_schema, schema_name, SchemaDialect};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, ContentPart, ImageUrl, JsonSchemaSpec,
    MessageContent, ResponseFormat,
};
use crate::ProviderRequest;

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 1024;
const APP_TITLE: &str = "Quizpilot";

/// Which OpenAI-compatible service is being called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Cerebras,
    OpenRouter,
}

impl Flavor {
    fn provider(&self) -> ProviderId {
        match self {
            Self::Cerebras => ProviderId::Cerebras,
            Self::OpenRouter => ProviderId::OpenRouter,
        }
    }

    fn reply(&self, response: ChatResponse) -> ProviderReply {
        match self {
            Self::Cerebras => ProviderReply::Cerebras(response),
            Self::OpenRouter => ProviderReply::OpenRouter(response),
        }
    }

    /// Whether an error response means strict json_schema is unsupported
    pub(crate) fn is_schema_rejection(&self, outcome: &HttpOutcome) -> bool {
        let message = outcome.error_message();
        match self {
            Self::Cerebras => {
                message.contains("json_schema")
                    || message.contains("strict=True")
                    || outcome.error_code().as_deref() == Some("wrong_api_format")
            }
            Self::OpenRouter => message.contains("json_schema") || message.contains("strict"),
        }
    }
}

fn message_content(flavor: Flavor, request: &ProviderRequest) -> MessageContent {
    if request.images.is_empty() {
        return MessageContent::Text(request.prompt.clone());
    }
    let provider = flavor.provider();
    if !provider.supports_images() {
        warn!(
            %provider,
            images = request.images.len(),
            "Provider does not accept images, sending text only"
        );
        return MessageContent::Text(request.prompt.clone());
    }

    let mut parts: Vec<ContentPart> = request
        .images
        .iter()
        .map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.to_data_url(),
            },
        })
        .collect();
    parts.push(ContentPart::Text {
        text: request.prompt.clone(),
    });
    MessageContent::Parts(parts)
}

/// Build a chat request; `strict` asks for the json_schema response format,
/// otherwise json_object
pub(crate) fn build_request(
    flavor: Flavor,
    model: &str,
    request: &ProviderRequest,
    strict: bool,
) -> ChatRequest {
    let response_format = if strict {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: schema_name(&request.hints).to_string(),
                strict: true,
                schema: answer_schema(&request.hints, SchemaDialect::OpenAi),
            },
        }
    } else {
        ResponseFormat::JsonObject
    };

    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: message_content(flavor, request),
        }],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        response_format: Some(response_format),
    }
}

fn post(
    flavor: Flavor,
    http: &reqwest::Client,
    base: &str,
    credential: &str,
    body: &ChatRequest,
) -> reqwest::RequestBuilder {
    let builder = http
        .post(join_url(base, "v1/chat/completions"))
        .bearer_auth(credential)
        .json(body);
    match flavor {
        Flavor::OpenRouter => builder.header("X-Title", APP_TITLE),
        Flavor::Cerebras => builder,
    }
}

/// Call chat completions, retrying once in json_object mode if the strict
/// schema is refused
#[instrument(skip_all, fields(provider = %flavor.provider(), model = %choice.model))]
pub(crate) async fn call(
    flavor: Flavor,
    http: &reqwest::Client,
    base: &str,
    choice: &ProviderChoice,
    request: &ProviderRequest,
) -> Result<ReplyEnvelope> {
    let provider = flavor.provider();

    debug!("Sending strict json_schema request");
    let strict = build_request(flavor, &choice.model, request, true);
    let mut outcome = send(provider, post(flavor, http, base, &choice.credential, &strict)).await?;
    let mut degraded = false;

    if !outcome.is_success() && flavor.is_schema_rejection(&outcome) {
        warn!(
            status = outcome.status,
            message = %outcome.error_message(),
            "Strict schema rejected, retrying in json_object mode"
        );
        let loose = build_request(flavor, &choice.model, request, false);
        outcome = send(provider, post(flavor, http, base, &choice.credential, &loose)).await?;
        degraded = true;
    }

    if !outcome.is_success() {
        return Err(if degraded {
            outcome.into_degraded_error(provider)
        } else {
            outcome.into_api_error(provider)
        });
    }

    let response: ChatResponse = outcome.parse(provider)?;
    Ok(flavor.reply(response).into_envelope(degraded))
}

/// Check the key and model with a one-token completion
pub(crate) async fn probe(
    flavor: Flavor,
    http: &reqwest::Client,
    base: &str,
    choice: &ProviderChoice,
) -> Result<bool> {
    let body = ChatRequest {
        model: choice.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text("ping".to_string()),
        }],
        temperature: 0.0,
        max_tokens: 1,
        response_format: None,
    };
    let outcome = send(
        flavor.provider(),
        post(flavor, http, base, &choice.credential, &body),
    )
    .await?;

    if !outcome.is_success() {
        warn!(
            provider = %flavor.provider(),
            status = outcome.status,
            message = %outcome.error_message(),
            "Provider probe failed"
        );
    }
    Ok(outcome.is_success())
}
