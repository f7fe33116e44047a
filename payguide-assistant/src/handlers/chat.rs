use super::{hx_redirect, UiError};
use crate::models::{ChatMessage, Transcript};
use crate::services::metrics;
use crate::services::providers::GenerateRequest;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::time::Instant;
use tower_sessions::Session;
use validator::{Validate, ValidationErrors};

pub const MAX_QUESTION_CHARS: usize = 4000;

#[derive(Template)]
#[template(path = "partials/exchange.html")]
pub struct ExchangeFragment {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionForm {
    #[validate(length(
        min = 1,
        max = 4000,
        message = "Please enter a question of at most 4000 characters"
    ))]
    pub question: String,
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<ChatMessage>,
}

/// Read the session transcript; a fresh session has an empty one.
pub async fn load_transcript(session: &Session) -> Result<Transcript, UiError> {
    Ok(session
        .get::<Transcript>(Transcript::SESSION_KEY)
        .await?
        .unwrap_or_default())
}

pub async fn ask(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<QuestionForm>,
) -> Response {
    let form = QuestionForm {
        question: form.question.trim().to_string(),
    };

    match answer_question(&state, &session, &form).await {
        Ok(answer) => {
            metrics::record_question("success");
            ExchangeFragment {
                question: form.question,
                answer,
            }
            .into_response()
        }
        Err(e) => {
            metrics::record_question("failure");
            tracing::warn!(status = %e.status, error = %e.message, "Question failed");
            e.into_response()
        }
    }
}

async fn answer_question(
    state: &AppState,
    session: &Session,
    form: &QuestionForm,
) -> Result<String, UiError> {
    form.validate()
        .map_err(|e| UiError::new(StatusCode::UNPROCESSABLE_ENTITY, validation_message(&e)))?;

    let model = &state.config.gemini.model;
    let cached = state
        .cache
        .get_or_upload(
            state.provider.as_ref(),
            &state.store,
            model,
            &state.config.document.display_name,
        )
        .await?;

    let mut transcript = load_transcript(session).await?;
    let history = transcript.recent_exchanges(state.prompt.history_turns());

    let request = GenerateRequest {
        model: model.clone(),
        system_instruction: state.prompt.system_instruction(),
        document: Some(cached.handle),
        prompt: state.prompt.render_question(history, &form.question),
    };

    let started = Instant::now();
    let result = state.provider.generate(&request).await;
    metrics::record_provider_latency(model, started.elapsed().as_secs_f64());

    let response = result.map_err(|e| {
        tracing::error!(error = %e, kind = e.kind(), model = %model, "Generation failed");
        e
    })?;
    metrics::record_tokens(response.input_tokens, response.output_tokens);

    let answer = state.prompt.finalize_answer(&response.text);

    transcript.record_exchange(form.question.clone(), answer.clone());
    session
        .insert(Transcript::SESSION_KEY, &transcript)
        .await?;

    tracing::info!(
        model = %model,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        finish_reason = ?response.finish_reason,
        turns = transcript.len(),
        "Answered question"
    );

    Ok(answer)
}

fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

pub async fn clear(session: Session) -> Result<Response, UiError> {
    session
        .remove::<Transcript>(Transcript::SESSION_KEY)
        .await?;
    tracing::info!("Cleared chat transcript");
    Ok(hx_redirect("/"))
}

/// JSON route, so session failures use the JSON error body.
pub async fn transcript(session: Session) -> Result<Json<TranscriptResponse>, AppError> {
    let transcript: Transcript = session
        .get(Transcript::SESSION_KEY)
        .await
        .map_err(|e| AppError::SessionError(e.to_string()))?
        .unwrap_or_default();
    Ok(Json(TranscriptResponse {
        messages: transcript.messages().to_vec(),
    }))
}
