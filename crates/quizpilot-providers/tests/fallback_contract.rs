//! Adapter contract tests against an in-process fake provider server

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use quizpilot_core::{AnswerShapeHints, EndpointConfig, ProviderChoice, ProviderId, QuizError};
use quizpilot_providers::{HttpProviders, ProviderClient, ProviderRequest};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Accept every request
    Accept,
    /// Refuse strict schemas with the given status and body, accept loose JSON mode
    RejectSchema(u16, &'static str),
    /// Refuse every request with the given status and body
    RejectAll(u16, &'static str),
}

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    body: Value,
    title: Option<String>,
    authorization: Option<String>,
    key: Option<String>,
}

#[derive(Clone)]
struct Fake {
    behavior: Behavior,
    reply_text: Vec<&'static str>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Fake {
    fn record(&self, path: &str, headers: &HeaderMap, key: Option<String>, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            body,
            title: header("x-title"),
            authorization: header("authorization"),
            key,
        });
    }

    fn verdict(&self, strict: bool) -> Option<(StatusCode, Json<Value>)> {
        let (status, body) = match self.behavior {
            Behavior::Accept => return None,
            Behavior::RejectSchema(status, body) if strict => (status, body),
            Behavior::RejectSchema(..) => return None,
            Behavior::RejectAll(status, body) => (status, body),
        };
        let body: Value = serde_json::from_str(body).unwrap();
        Some((StatusCode::from_u16(status).unwrap(), Json(body)))
    }
}

async fn chat(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let strict = body["response_format"]["type"] == "json_schema";
    fake.record("/v1/chat/completions", &headers, None, body);
    if let Some(rejection) = fake.verdict(strict) {
        return rejection;
    }
    let content = fake.reply_text.join("");
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })),
    )
}

async fn gemini_generate(
    State(fake): State<Fake>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let strict = body["generationConfig"].get("responseSchema").is_some();
    fake.record("generate", &headers, query.get("key").cloned(), body);
    if let Some(rejection) = fake.verdict(strict) {
        return rejection;
    }
    let parts: Vec<Value> = fake.reply_text.iter().map(|t| json!({"text": t})).collect();
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{"content": {"parts": parts, "role": "model"}, "finishReason": "STOP"}]
        })),
    )
}

async fn gemini_model(
    State(fake): State<Fake>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    fake.record("model", &headers, query.get("key").cloned(), Value::Null);
    if let Some(rejection) = fake.verdict(false) {
        return rejection;
    }
    (StatusCode::OK, Json(json!({"name": "models/gemini-2.5-flash"})))
}

/// Start a fake server and return a client pointed at it plus the request log
async fn start(behavior: Behavior, reply_text: Vec<&'static str>) -> (HttpProviders, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fake = Fake {
        behavior,
        reply_text,
        seen: seen.clone(),
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(chat))
        .route("/v1beta/models/:call", post(gemini_generate).get(gemini_model))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpProviders::new(EndpointConfig::all_at(format!("http://{}", addr))).unwrap();
    (client, seen)
}

fn letters_request() -> ProviderRequest {
    ProviderRequest {
        prompt: "Which planet is largest?".to_string(),
        images: Vec::new(),
        hints: AnswerShapeHints::Letters {
            allowed: vec!['A', 'B', 'C', 'D'],
            multiple: false,
            exact_count: None,
        },
    }
}

#[tokio::test]
async fn cerebras_falls_back_to_json_object_once() {
    let (client, seen) = start(
        Behavior::RejectSchema(400, r#"{"message":"Unsupported response format","code":"wrong_api_format"}"#),
        vec![r#"{"letters":["C"]}"#],
    )
    .await;

    let choice = ProviderChoice::new(ProviderId::Cerebras, "qwen-3-235b-a22b-instruct-2507", "csk-1");
    let envelope = client.call(&choice, &letters_request()).await.unwrap();

    assert_eq!(envelope.text, r#"{"letters":["C"]}"#);
    assert!(envelope.degraded);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].body["response_format"]["type"], "json_schema");
    assert_eq!(seen[1].body["response_format"], json!({"type": "json_object"}));
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer csk-1"));
    assert_eq!(seen[0].title, None);
}

#[tokio::test]
async fn openrouter_strict_success_needs_one_request() {
    let (client, seen) = start(Behavior::Accept, vec![r#"{"letters":["A"]}"#]).await;

    let choice = ProviderChoice::new(ProviderId::OpenRouter, "openai/gpt-4o-mini", "sk-or");
    let envelope = client.call(&choice, &letters_request()).await.unwrap();

    assert!(!envelope.degraded);
    assert_eq!(envelope.provider, ProviderId::OpenRouter);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].title.as_deref(), Some("Quizpilot"));
    assert_eq!(
        seen[0].body["response_format"]["json_schema"]["schema"]["properties"]["letters"]["maxItems"],
        1
    );
}

#[tokio::test]
async fn degraded_retry_failure_is_reported_after_exactly_one_retry() {
    let (client, seen) = start(
        Behavior::RejectAll(400, r#"{"error":{"message":"json_schema is not supported for this model"}}"#),
        vec![],
    )
    .await;

    let choice = ProviderChoice::new(ProviderId::OpenRouter, "some/model", "sk-or");
    let err = client.call(&choice, &letters_request()).await.unwrap_err();

    match err {
        QuizError::SchemaRejected { provider, body } => {
            assert_eq!(provider, ProviderId::OpenRouter);
            assert!(body.contains("json_schema"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unrelated_errors_are_not_retried() {
    let (client, seen) = start(
        Behavior::RejectAll(401, r#"{"message":"Wrong API Key","code":"wrong_api_key"}"#),
        vec![],
    )
    .await;

    let choice = ProviderChoice::new(ProviderId::Cerebras, "qwen", "bad");
    let err = client.call(&choice, &letters_request()).await.unwrap_err();

    assert!(matches!(err, QuizError::Api { status: 401, .. }));
    assert!(!err.is_fatal());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn gemini_drops_schema_on_rejection_and_joins_parts() {
    let (client, seen) = start(
        Behavior::RejectSchema(
            400,
            r#"{"error":{"code":400,"message":"Invalid value at 'generation_config.response_schema'","status":"INVALID_ARGUMENT"}}"#,
        ),
        vec![r#"{"letters":"#, r#"["B"]}"#],
    )
    .await;

    let choice = ProviderChoice::new(ProviderId::Gemini, "gemini-2.5-flash", "AIza-test");
    let envelope = client.call(&choice, &letters_request()).await.unwrap();

    assert!(envelope.degraded);
    assert_eq!(envelope.fragment_count, 2);
    assert_eq!(envelope.text, "{\"letters\":\n[\"B\"]}");
    assert_eq!(envelope.finish_reason.as_deref(), Some("STOP"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].key.as_deref(), Some("AIza-test"));
    assert!(seen[0].body["generationConfig"].get("responseSchema").is_some());
    assert!(seen[1].body["generationConfig"].get("responseSchema").is_none());
    assert_eq!(seen[1].body["generationConfig"]["responseMimeType"], "application/json");
}

#[tokio::test]
async fn probes_use_cheap_requests() {
    let (client, seen) = start(Behavior::Accept, vec!["ok"]).await;

    let gemini = ProviderChoice::new(ProviderId::Gemini, "gemini-2.5-flash", "AIza-test");
    assert!(client.probe(&gemini).await.unwrap());

    let cerebras = ProviderChoice::new(ProviderId::Cerebras, "qwen", "csk");
    assert!(client.probe(&cerebras).await.unwrap());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].path, "model");
    assert_eq!(seen[0].key.as_deref(), Some("AIza-test"));
    assert_eq!(seen[1].body["max_tokens"], 1);
    assert_eq!(seen[1].body["messages"][0]["content"], "ping");
    assert!(seen[1].body.get("response_format").is_none());
}

#[tokio::test]
async fn failed_probe_returns_false() {
    let (client, _seen) = start(Behavior::RejectAll(403, r#"{"error":{"message":"forbidden"}}"#), vec![]).await;

    let choice = ProviderChoice::new(ProviderId::OpenRouter, "openai/gpt-4o-mini", "sk-or");
    assert!(!client.probe(&choice).await.unwrap());
}
