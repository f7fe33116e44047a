use payguide_assistant::models::FileState;
use payguide_assistant::services::providers::gemini::{GeminiConfig, GeminiProvider};
use payguide_assistant::services::providers::{GenerateRequest, ProviderError, TextProvider};
use secrecy::Secret;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF: &[u8] = b"%PDF-1.7\n%%EOF\n";

fn provider(server: &MockServer, api_key: &str) -> GeminiProvider {
    GeminiProvider::new(GeminiConfig {
        api_key: Secret::new(api_key.to_string()),
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        file_poll_attempts: 3,
        file_poll_interval: Duration::from_millis(5),
    })
    .unwrap()
}

async fn mount_upload(server: &MockServer, state: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", "key"))
        .and(header("x-goog-upload-command", "start"))
        .and(body_json(json!({"file": {"displayName": "Pay Guide"}})))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "x-goog-upload-url",
            format!("{}/upload-session/1", server.uri()).as_str(),
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/guide",
                "uri": format!("{}/v1beta/files/guide", server.uri()),
                "mimeType": "application/pdf",
                "state": state
            }
        })))
        .mount(server)
        .await;
}

fn question(model: &str) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        system_instruction: "Answer from the Pay Guide.".to_string(),
        document: None,
        prompt: "What is the Level 1 rate?".to_string(),
    }
}

#[tokio::test]
async fn upload_polls_until_the_file_is_active() {
    let server = MockServer::start().await;
    mount_upload(&server, "PROCESSING").await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/guide"))
        .and(header("x-goog-api-key", "key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "files/guide",
            "uri": format!("{}/v1beta/files/guide", server.uri()),
            "state": "ACTIVE"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = provider(&server, "key")
        .upload_document(PDF.to_vec(), "application/pdf", "Pay Guide")
        .await
        .unwrap();

    assert_eq!(handle.name, "files/guide");
    assert_eq!(handle.state, FileState::Active);
    assert_eq!(handle.mime_type, "application/pdf");
}

#[tokio::test]
async fn failed_processing_is_an_error() {
    let server = MockServer::start().await;
    mount_upload(&server, "FAILED").await;

    let result = provider(&server, "key")
        .upload_document(PDF.to_vec(), "application/pdf", "Pay Guide")
        .await;

    assert!(matches!(result, Err(ProviderError::FileProcessingFailed(_))));
}

#[tokio::test]
async fn missing_api_key_never_reaches_the_network() {
    let server = MockServer::start().await;

    let result = provider(&server, "").generate(&question("gemini-2.5-flash")).await;

    assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn generate_returns_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Level 1 is $24.10."}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 7}
        })))
        .mount(&server)
        .await;

    let response = provider(&server, "key")
        .generate(&question("models/gemini-2.5-flash"))
        .await
        .unwrap();

    assert_eq!(response.text, "Level 1 is $24.10.");
    assert_eq!(response.input_tokens, 50);
    assert_eq!(response.output_tokens, 7);
}

#[tokio::test]
async fn safety_block_maps_to_content_filtered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let result = provider(&server, "key")
        .generate(&question("gemini-2.5-flash"))
        .await;

    assert!(matches!(result, Err(ProviderError::ContentFiltered)));
}

#[tokio::test]
async fn empty_candidates_are_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let result = provider(&server, "key")
        .generate(&question("gemini-2.5-flash"))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = provider(&server, "key")
        .generate(&question("gemini-2.5-flash"))
        .await;

    assert!(matches!(result, Err(ProviderError::RateLimited)));
}

#[tokio::test]
async fn api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let error = provider(&server, "key")
        .generate(&question("gemini-2.5-flash"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::ApiError(_)));
    assert!(error.to_string().contains("API key not valid"));
}
