//! HTTP client tests against mock Azure endpoints.

mod common;

use docqa::cache::AnswerCache;
use docqa::completion::{AzureChatClient, CompletionError, CompletionModel};
use docqa::config::Config;
use docqa::generator::ResponseGenerator;
use docqa::search::{AzureSearchClient, ContextRetriever, SearchError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/indexes/policies/docs/search";
const CHAT_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

fn search_client(server: &MockServer) -> AzureSearchClient {
    AzureSearchClient::new(server.uri(), "policies", "search-secret", "2023-11-01")
}

fn chat_client(server: &MockServer) -> AzureChatClient {
    AzureChatClient::new(server.uri(), "gpt-4o", "openai-secret", "2024-02-01", None).unwrap()
}

fn chat_body(answer: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": answer } }
        ]
    })
}

// ─── Azure AI Search ────────────────────────────────────────────────

#[tokio::test]
async fn search_sends_query_and_maps_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(query_param("api-version", "2023-11-01"))
        .and(header("api-key", "search-secret"))
        .and(body_partial_json(json!({ "search": "leave policy", "top": 50 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "@search.score": 3.2,
                    "content": "Leave is 25 days.",
                    "metadata_spo_item_name": "HR Policy",
                    "metadata_spo_item_path": "https://store/hr.pdf"
                },
                { "content": "Unnamed fragment." },
                {
                    "content": "",
                    "metadata_spo_item_name": "Scanned Form",
                    "metadata_spo_item_path": "No URL Available"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let retrieval = search_client(&server)
        .retrieve("leave policy", 50)
        .await
        .unwrap();

    let texts: Vec<&str> = retrieval.passages.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Leave is 25 days.", "Unnamed fragment."]);

    let refs: Vec<String> = retrieval.references.iter().map(|r| r.to_string()).collect();
    assert_eq!(
        refs,
        vec![
            "[HR Policy](https://store/hr.pdf)",
            "Untitled Document",
            "Scanned Form",
        ]
    );
}

#[tokio::test]
async fn search_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let err = search_client(&server).retrieve("q", 5).await.unwrap_err();
    match err {
        SearchError::Status { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "Forbidden");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn search_response_without_value_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "odata": 1 })))
        .mount(&server)
        .await;

    let err = search_client(&server).retrieve("q", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Decode(_)));
}

// ─── Azure OpenAI ───────────────────────────────────────────────────

#[tokio::test]
async fn completion_sends_single_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(query_param("api-version", "2024-02-01"))
        .and(header("api-key", "openai-secret"))
        .and(body_partial_json(json!({
            "messages": [ { "role": "user", "content": "Context:\nx\n\nUser Query: y" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("  **Yes**, see §2.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = chat_client(&server)
        .complete("Context:\nx\n\nUser Query: y")
        .await
        .unwrap();
    assert_eq!(answer, "  **Yes**, see §2.\n");
}

#[tokio::test]
async fn completion_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let err = chat_client(&server).complete("p").await.unwrap_err();
    assert!(matches!(err, CompletionError::Status { status: 429, .. }));
}

#[tokio::test]
async fn completion_without_choices_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = chat_client(&server).complete("p").await.unwrap_err();
    assert!(matches!(err, CompletionError::Decode(_)));
}

#[tokio::test]
async fn completion_timeout_is_a_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = AzureChatClient::new(
        server.uri(),
        "gpt-4o",
        "openai-secret",
        "2024-02-01",
        Some(Duration::from_millis(200)),
    )
    .unwrap();
    let err = client.complete("p").await.unwrap_err();
    assert!(matches!(err, CompletionError::Request(_)));
}

// ─── Both services together ─────────────────────────────────────────

#[tokio::test]
async fn configured_generator_calls_each_service_once_per_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "content": "Leave is 25 days.", "metadata_spo_item_name": "HR Policy" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "messages": [ { "role": "user", "content":
                "Context:\nLeave is 25 days.\n\nUser Query: How much leave?\n\nAnswer based on context in structured format:" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("25 days.")))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = Config::default();
    cfg.search.endpoint = Some(server.uri());
    let creds = &mut cfg.credentials;
    creds.azure_search_index = Some("policies".into());
    creds.azure_search_key = Some("search-secret".into());
    creds.azure_openai_endpoint = Some(server.uri());
    creds.openai_deployment_name = Some("gpt-4o".into());
    creds.openai_api_key = Some("openai-secret".into());

    let gen = ResponseGenerator::from_config(&cfg);
    assert_eq!(gen.model_name(), "gpt-4o");

    let first = gen.answer("How much leave?", None).await.unwrap();
    let second = gen.answer("How much leave?", None).await.unwrap();

    assert_eq!(first.text, "25 days.");
    assert_eq!(first.references, vec!["HR Policy"]);
    assert_eq!(second.text, first.text);
    assert!(second.cached);
}

#[tokio::test]
async fn unreachable_search_falls_back_to_empty_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "messages": [ { "role": "user", "content":
                "Context:\nNo relevant documents found.\n\nUser Query: q\n\nAnswer based on context in structured format:" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("unknown")))
        .expect(1)
        .mount(&server)
        .await;

    let gen = ResponseGenerator::new(
        Arc::new(search_client(&server)),
        Arc::new(chat_client(&server)),
        AnswerCache::new(4),
    );
    let answer = gen.answer("q", None).await.unwrap();

    assert_eq!(answer.text, "unknown");
    assert_eq!(answer.notices.len(), 1);
    assert!(answer.references.is_empty());
}
