//! Wire formats of the provider APIs

use quizpilot_core::InlineImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Gemini generateContent

/// Gemini generateContent request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// One request part: text or inline image data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineImage>,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: &InlineImage) -> Self {
        Self {
            text: None,
            inline_data: Some(image.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

/// Gemini generateContent response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiCandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiCandidateContent {
    #[serde(default)]
    pub parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

// OpenAI-compatible chat completions (Cerebras, OpenRouter)

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain text content, or multimodal parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Requested output mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaSpec },
    JsonObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaSpec {
    pub name: String,
    pub strict: bool,
    pub schema: Value,
}

/// Chat completion response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponseMessage {
    /// A string, or an array of `{type, text}` parts on some routers
    #[serde(default)]
    pub content: Option<Value>,
}

impl ChatResponseMessage {
    /// Text fragments of the message, in order
    pub fn fragments(&self) -> Vec<String> {
        match &self.content {
            Some(Value::String(text)) => vec![text.clone()],
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.clone()),
                    other => other.get("text").and_then(Value::as_str).map(String::from),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_format_wire_shape() {
        let strict = ResponseFormat::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: "answer_schema".to_string(),
                strict: true,
                schema: json!({"type": "object"}),
            },
        };
        let value = serde_json::to_value(&strict).unwrap();
        assert_eq!(value["type"], "json_schema");
        assert_eq!(value["json_schema"]["name"], "answer_schema");
        assert_eq!(value["json_schema"]["strict"], true);

        let loose = serde_json::to_value(ResponseFormat::JsonObject).unwrap();
        assert_eq!(loose, json!({"type": "json_object"}));
    }

    #[test]
    fn test_multimodal_content_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "question".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".to_string(),
                },
            },
        ]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value[0], json!({"type": "text", "text": "question"}));
        assert_eq!(value[1]["type"], "image_url");
        assert_eq!(value[1]["image_url"]["url"], "data:image/png;base64,AAAA");

        let plain = serde_json::to_value(MessageContent::Text("hi".to_string())).unwrap();
        assert_eq!(plain, json!("hi"));
    }

    #[test]
    fn test_gemini_part_uses_camel_case() {
        let part = GeminiPart::image(&InlineImage::png("AAAA"));
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value, json!({"inlineData": {"mimeType": "image/png", "data": "AAAA"}}));
    }

    #[test]
    fn test_chat_message_fragments() {
        let message: ChatResponseMessage =
            serde_json::from_value(json!({"content": [{"type": "text", "text": "{\"letters\":"}, {"type": "text", "text": "[\"A\"]}"}]}))
                .unwrap();
        assert_eq!(message.fragments(), vec!["{\"letters\":", "[\"A\"]}"]);

        let message: ChatResponseMessage = serde_json::from_value(json!({"content": null})).unwrap();
        assert!(message.fragments().is_empty());
    }
}
