mod common;

use common::{TestApp, GENERATE_PATH, UPLOAD_START_PATH};
use payguide_assistant::config::DEFAULT_DISCLAIMER;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn answer_ends_with_disclaimer_and_is_recorded() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("A Level 2 employee earns $25.10 per hour.")
        .await;

    let response = app.ask("What does a Level 2 employee earn?").await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("What does a Level 2 employee earn?"));
    assert!(body.contains("A Level 2 employee earns $25.10 per hour."));
    assert!(body.contains(DEFAULT_DISCLAIMER));

    let transcript = app.transcript().await;
    let messages = transcript["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What does a Level 2 employee earn?");
    assert_eq!(messages[1]["role"], "assistant");
    let answer = messages[1]["content"].as_str().unwrap();
    assert!(!answer.is_empty());
    assert!(answer.ends_with(DEFAULT_DISCLAIMER));
}

#[tokio::test]
async fn request_carries_document_and_instruction() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Answer.").await;

    app.ask("Is overtime paid at time and a half?").await;

    let requests = app.gemini_requests(GENERATE_PATH).await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.url.query().is_none());

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert!(body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains(DEFAULT_DISCLAIMER));
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts[0]["fileData"]["mimeType"], "application/pdf");
    assert!(parts[0]["fileData"]["fileUri"]
        .as_str()
        .unwrap()
        .ends_with("/v1beta/files/pay-guide-1"));
    assert_eq!(parts[1]["text"], "Is overtime paid at time and a half?");
}

#[tokio::test]
async fn pay_guide_is_uploaded_once_across_questions() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Answer.").await;

    assert_eq!(app.ask("First question").await.status(), 200);
    assert_eq!(app.ask("Second question").await.status(), 200);

    assert_eq!(app.gemini_requests(UPLOAD_START_PATH).await.len(), 1);
    assert_eq!(app.gemini_requests(GENERATE_PATH).await.len(), 2);

    let cached = app.state.cache.current().await.unwrap();
    assert_eq!(cached.handle.name, "files/pay-guide-1");
    assert_eq!(cached.model, common::MODEL);
}

#[tokio::test]
async fn follow_up_questions_include_prior_turns() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Casual loading is 25%.").await;

    app.ask("What is the casual loading?").await;
    app.ask("Does it apply on weekends?").await;

    let requests = app.gemini_requests(GENERATE_PATH).await;
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let text = second["contents"][0]["parts"][1]["text"].as_str().unwrap();

    assert!(text.contains("User: What is the casual loading?"));
    assert!(text.contains("Assistant: Casual loading is 25%."));
    assert!(text.ends_with("Does it apply on weekends?"));
}

#[tokio::test]
async fn history_is_capped_at_whole_exchanges() {
    let app = TestApp::spawn_with(true, |config| config.assistant.history_turns = 1).await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Answer.").await;

    app.ask("First question").await;
    app.ask("Second question").await;
    app.ask("Third question").await;

    let requests = app.gemini_requests(GENERATE_PATH).await;
    let third: serde_json::Value = serde_json::from_slice(&requests[2].body).unwrap();
    let text = third["contents"][0]["parts"][1]["text"].as_str().unwrap();

    assert!(text.starts_with("Conversation so far:\nUser: Second question"));
    assert!(!text.contains("First question"));
    assert!(text.ends_with("Third question"));
}

#[tokio::test]
async fn upstream_failure_shows_error_and_records_nothing() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": 500, "message": "The model is overloaded", "status": "INTERNAL"}
        })))
        .mount(&app.gemini)
        .await;

    let response = app.ask("What is the Level 1 rate?").await;

    assert_eq!(response.status(), 502);
    let body = response.text().await.unwrap();
    assert!(body.contains("Error: "));
    assert!(body.contains("The model is overloaded"));

    let transcript = app.transcript().await;
    assert!(transcript["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&app.gemini)
        .await;

    let response = app.ask("Anything").await;

    assert_eq!(response.status(), 429);
    assert!(response.text().await.unwrap().contains("Rate limited"));
}

#[tokio::test]
async fn blank_question_is_rejected_without_calling_gemini() {
    let app = TestApp::spawn().await;

    let response = app.ask("   \n  ").await;

    assert_eq!(response.status(), 422);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Please enter a question"));
    assert!(app.gemini_requests(GENERATE_PATH).await.is_empty());
    assert!(app.gemini_requests(UPLOAD_START_PATH).await.is_empty());
}

#[tokio::test]
async fn overlong_question_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.ask(&"a".repeat(4001)).await;

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn missing_pay_guide_is_reported() {
    let app = TestApp::spawn_without_pdf().await;

    let response = app.ask("What is the Level 1 rate?").await;

    assert_eq!(response.status(), 404);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Error: Pay Guide PDF not found"));
    assert!(app.gemini_requests(UPLOAD_START_PATH).await.is_empty());
}

#[tokio::test]
async fn clear_empties_the_transcript() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Answer.").await;
    app.ask("Question").await;

    let response = app.post_htmx("/chat/clear").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("HX-Redirect").unwrap(), "/");
    let transcript = app.transcript().await;
    assert!(transcript["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn index_renders_session_history() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Penalty rates apply on Sundays.").await;
    app.ask("When do penalty rates apply?").await;

    let response = app.client.get(app.url("/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("When do penalty rates apply?"));
    assert!(body.contains("Penalty rates apply on Sundays."));
}

#[tokio::test]
async fn transcripts_are_per_session() {
    let app = TestApp::spawn().await;
    app.mount_gemini_upload().await;
    app.mount_gemini_answer("Answer.").await;
    app.ask("Question from the first browser").await;

    let other: serde_json::Value = reqwest::Client::new()
        .get(app.url("/chat/transcript"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(other["messages"].as_array().unwrap().is_empty());
}
