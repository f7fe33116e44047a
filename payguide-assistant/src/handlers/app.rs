use super::chat::{load_transcript, MAX_QUESTION_CHARS};
use super::UiError;
use crate::models::ChatMessage;
use crate::AppState;
use askama::Template;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::{json, Value};
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub document_name: String,
    pub document_available: bool,
    pub messages: Vec<ChatMessage>,
    pub max_question_chars: usize,
}

pub async fn index(
    State(state): State<AppState>,
    session: Session,
) -> Result<IndexTemplate, UiError> {
    let transcript = load_transcript(&session).await?;

    Ok(IndexTemplate {
        title: state.config.assistant.title.clone(),
        document_name: state.config.document.display_name.clone(),
        document_available: state.store.exists().await,
        messages: transcript.messages().to_vec(),
        max_question_chars: MAX_QUESTION_CHARS,
    })
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "payguide-assistant",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready once the Pay Guide PDF is on disk.
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if !state.store.exists().await {
        return Err(AppError::ServiceUnavailable(format!(
            "Pay Guide PDF not found at {}",
            state.store.path().display()
        )));
    }

    Ok(Json(json!({ "status": "ready" })))
}
