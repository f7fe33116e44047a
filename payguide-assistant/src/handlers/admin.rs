use super::{hx_redirect, UiError};
use crate::middleware::admin::{is_admin, ADMIN_SESSION_KEY};
use crate::models::CachedDocument;
use crate::services::github::{GitHubError, PublishedCommit};
use crate::services::metrics;
use crate::services::pay_guide::PayGuideInfo;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::secret::secrets_match;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "admin_login.html")]
pub struct AdminLoginTemplate {
    pub title: String,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminPanelTemplate {
    pub title: String,
    pub document_path: String,
    pub document: Option<PayGuideInfo>,
    pub cached: Option<CachedDocument>,
    pub model: String,
    pub github_target: String,
    pub github_disabled: Option<String>,
}

/// One line of an admin action report.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Step {
    fn ok(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: true,
            detail: detail.into(),
        }
    }

    fn failed(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Template)]
#[template(path = "partials/admin_result.html")]
pub struct AdminResultFragment {
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub password: String,
}

pub async fn admin_page(State(state): State<AppState>, session: Session) -> Response {
    let title = state.config.assistant.title.clone();

    if !is_admin(&session).await {
        return AdminLoginTemplate { title }.into_response();
    }

    let document = match state.store.metadata().await {
        Ok(document) => document,
        Err(e) => return UiError::from(e).into_response(),
    };

    AdminPanelTemplate {
        title,
        document_path: state.store.path().display().to_string(),
        document,
        cached: state.cache.current().await,
        model: state.config.gemini.model.clone(),
        github_target: format!(
            "{}:{}/{}",
            state.config.github.repository(),
            state.config.github.branch,
            state.config.github.path
        ),
        github_disabled: state.github().err().map(|e| e.to_string()),
    }
    .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, UiError> {
    let expected = state.config.admin.password.expose_secret();

    if expected.is_empty() || !secrets_match(expected, &form.password) {
        tracing::warn!("Admin login failed");
        return Err(UiError::new(StatusCode::UNAUTHORIZED, "Incorrect password"));
    }

    session.cycle_id().await?;
    session.insert(ADMIN_SESSION_KEY, true).await?;
    tracing::info!("Admin logged in");

    Ok(hx_redirect("/admin"))
}

pub async fn logout(session: Session) -> Result<Response, UiError> {
    session.remove::<bool>(ADMIN_SESSION_KEY).await?;
    session.cycle_id().await?;
    tracing::info!("Admin logged out");
    Ok(hx_redirect("/admin"))
}

/// Replace the PDF, drop the cached handle and optionally publish.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<AdminResultFragment, UiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut push = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UiError::new(e.status(), e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UiError::new(e.status(), e.body_text()))?;
                file = Some((file_name, data.to_vec()));
            }
            Some("push") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UiError::new(e.status(), e.body_text()))?;
                push = matches!(value.as_str(), "on" | "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let (file_name, bytes) = match file {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => {
            return Err(UiError::new(
                StatusCode::BAD_REQUEST,
                "Choose a PDF file to upload",
            ))
        }
    };

    let info = state.store.replace(&bytes).await?;
    tracing::info!(
        file_name = %file_name,
        size_bytes = info.size_bytes,
        "Admin replaced Pay Guide"
    );

    let mut steps = vec![Step::ok(
        "Saved",
        format!(
            "{} ({} bytes, sha256 {})",
            file_name,
            info.size_bytes,
            &info.sha256[..12]
        ),
    )];

    let cleared = state.cache.clear().await;
    steps.push(Step::ok(
        "Cache",
        if cleared {
            "Cleared the cached document handle"
        } else {
            "No cached document handle"
        },
    ));

    if push {
        steps.push(push_step(&state, &bytes).await);
    }

    Ok(AdminResultFragment { steps })
}

/// Push the PDF currently on disk.
pub async fn publish(State(state): State<AppState>) -> Result<AdminResultFragment, UiError> {
    let bytes = state.store.read().await?;
    let commit = push_to_github(&state, &bytes).await?;
    Ok(AdminResultFragment {
        steps: vec![published_step(&commit)],
    })
}

pub async fn clear_cache(State(state): State<AppState>) -> AdminResultFragment {
    let step = if state.cache.clear().await {
        Step::ok("Cache", "Cleared the cached document handle")
    } else {
        Step::ok("Cache", "No cached document handle")
    };
    AdminResultFragment { steps: vec![step] }
}

async fn push_step(state: &AppState, bytes: &[u8]) -> Step {
    match push_to_github(state, bytes).await {
        Ok(commit) => published_step(&commit),
        Err(e) => Step::failed("GitHub", e.to_string()),
    }
}

async fn push_to_github(state: &AppState, bytes: &[u8]) -> Result<PublishedCommit, GitHubError> {
    let client = state.github()?;

    match client.put_file(bytes).await {
        Ok(commit) => {
            metrics::record_github_push("success");
            Ok(commit)
        }
        Err(e) => {
            metrics::record_github_push("failure");
            Err(e)
        }
    }
}

fn published_step(commit: &PublishedCommit) -> Step {
    let short = &commit.commit_sha[..commit.commit_sha.len().min(7)];
    Step::ok(
        "GitHub",
        format!("Committed {} to {} ({})", commit.path, commit.branch, short),
    )
}
