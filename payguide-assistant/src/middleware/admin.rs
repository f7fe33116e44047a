use crate::handlers::{is_htmx, UiError};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Session flag set by a successful admin login.
pub const ADMIN_SESSION_KEY: &str = "admin_authenticated";

pub async fn is_admin(session: &Session) -> bool {
    session
        .get::<bool>(ADMIN_SESSION_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or(false)
}

/// Gate for admin actions: htmx callers get a 401 fragment, browsers are
/// sent back to the login form.
pub async fn admin_middleware(session: Session, request: Request, next: Next) -> Response {
    if is_admin(&session).await {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated admin request");

    if is_htmx(request.headers()) {
        UiError::new(StatusCode::UNAUTHORIZED, "Admin login required").into_response()
    } else {
        Redirect::to("/admin").into_response()
    }
}
