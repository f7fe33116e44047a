pub mod admin;
pub mod app;
pub mod chat;
pub mod diagnostics;
pub mod metrics;

use crate::services::document_cache::CacheError;
use crate::services::github::GitHubError;
use crate::services::providers::ProviderError;
use askama::Template;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

#[derive(Template)]
#[template(path = "partials/error.html")]
pub struct ErrorFragment<'a> {
    pub message: &'a str,
}

/// An error rendered as an htmx fragment reading `Error: {message}`.
#[derive(Debug)]
pub struct UiError {
    pub status: StatusCode,
    pub message: String,
}

impl UiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for UiError {
    fn into_response(self) -> Response {
        (
            self.status,
            ErrorFragment {
                message: &self.message,
            },
        )
            .into_response()
    }
}

impl From<AppError> for UiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        let message = match err {
            AppError::BadRequest(e) | AppError::NotFound(e) => e.to_string(),
            AppError::ServiceUnavailable(msg) => msg,
            other => other.to_string(),
        };
        Self::new(status, message)
    }
}

impl From<ProviderError> for UiError {
    fn from(err: ProviderError) -> Self {
        let status = match &err {
            ProviderError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProviderError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProviderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<CacheError> for UiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Document(e) => e.into(),
            CacheError::Upload(e) => {
                let mut ui: UiError = e.into();
                ui.message = format!("Upload failed: {}", ui.message);
                ui
            }
        }
    }
}

impl From<GitHubError> for UiError {
    fn from(err: GitHubError) -> Self {
        let status = match &err {
            GitHubError::NotConfigured(_) | GitHubError::Disabled(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GitHubError::Api { .. } | GitHubError::Network(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<tower_sessions::session::Error> for UiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::SessionError(err.to_string()).into()
    }
}

/// Tell htmx to navigate to `location`.
pub fn hx_redirect(location: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("HX-Redirect", HeaderValue::from_static(location));
    (StatusCode::OK, headers).into_response()
}

/// Whether the request was issued by htmx rather than a full page load.
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.get("HX-Request").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pdf_keeps_its_message() {
        let err = AppError::NotFound(anyhow::anyhow!("Pay Guide PDF not found at data/x.pdf"));
        let ui = UiError::from(err);
        assert_eq!(ui.status, StatusCode::NOT_FOUND);
        assert_eq!(ui.message, "Pay Guide PDF not found at data/x.pdf");
    }

    #[test]
    fn rate_limits_map_to_429() {
        let ui = UiError::from(ProviderError::RateLimited);
        assert_eq!(ui.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn upload_failures_are_prefixed() {
        let ui = UiError::from(CacheError::Upload(ProviderError::ApiError(
            "quota exceeded".to_string(),
        )));
        assert_eq!(ui.status, StatusCode::BAD_GATEWAY);
        assert_eq!(ui.message, "Upload failed: API error: quota exceeded");
    }

    #[test]
    fn disabled_publishing_is_unavailable() {
        let ui = UiError::from(GitHubError::Disabled("GITHUB_TOKEN is not set".to_string()));
        assert_eq!(ui.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ui.message, "GITHUB_TOKEN is not set");
    }
}
