mod common;

use common::groq_orchestrator;
use contextiq::config::ErrorPolicy;
use contextiq::error::ContextIqError;
use contextiq::orchestrator::{Advisory, GenerationOverrides, StreamEvent};
use contextiq::providers::Message;
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
    })
}

fn sse_body(tokens: &[&str]) -> String {
    let mut body = String::new();
    for token in tokens {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({ "choices": [{ "index": 0, "delta": { "content": token } }] })
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn no_stream() -> GenerationOverrides {
    GenerationOverrides {
        streaming: Some(false),
        ..GenerationOverrides::default()
    }
}

#[tokio::test]
async fn test_complete_sends_full_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk_test"))
        .and(body_partial_json(json!({
            "model": "llama-3.3-70b-versatile",
            "stream": false,
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello!" },
                { "role": "user", "content": "What is RAG?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Retrieval augmented generation.")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Propagate).await;
    let history = vec![
        Message::user("Hi"),
        Message::assistant("Hello!"),
        Message::user("What is RAG?"),
    ];

    let answer = orchestrator
        .generate("What is RAG?", &history, &no_stream(), None)
        .await
        .unwrap();
    assert_eq!(answer, "Retrieval augmented generation.");
}

#[tokio::test]
async fn test_streaming_delivers_tokens_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["Gen", "erative ", "AI"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Propagate).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let answer = orchestrator
        .generate(
            "q",
            &[Message::user("q")],
            &GenerationOverrides::default(),
            Some(tx),
        )
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(answer, "Generative AI");
    assert_eq!(
        events,
        vec![
            StreamEvent::Token("Gen".to_string()),
            StreamEvent::Token("erative ".to_string()),
            StreamEvent::Token("AI".to_string()),
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_rate_limit_becomes_advisory() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(3)
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Absorb).await;
    let answer = orchestrator
        .generate("q", &[Message::user("q")], &no_stream(), None)
        .await
        .unwrap();

    assert_eq!(answer, Advisory::RateLimit.message());
}

#[tokio::test]
async fn test_unauthorized_becomes_auth_advisory() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "Invalid API Key" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Absorb).await;
    let answer = orchestrator
        .generate("q", &[Message::user("q")], &no_stream(), None)
        .await
        .unwrap();

    assert_eq!(answer, Advisory::Authentication.message());
}

#[tokio::test]
async fn test_unauthorized_propagates_under_propagate_policy() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Propagate).await;
    let err = orchestrator
        .generate("q", &[Message::user("q")], &no_stream(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ContextIqError>(),
        Some(ContextIqError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Propagate).await;
    let answer = orchestrator
        .generate("q", &[Message::user("q")], &no_stream(), None)
        .await
        .unwrap();

    assert_eq!(answer, "recovered");
}

#[tokio::test]
async fn test_unknown_model_becomes_model_advisory() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&server)
        .await;

    let orchestrator = groq_orchestrator(&server.uri(), ErrorPolicy::Absorb).await;
    let answer = orchestrator
        .generate("q", &[Message::user("q")], &no_stream(), None)
        .await
        .unwrap();

    assert!(answer.contains("llama-3.3-70b-versatile"));
    assert!(answer.contains("Model Error"));
}
