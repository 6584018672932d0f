//! Bearer token authentication middleware.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::AppState;

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Returns `None` when the header
/// is missing, not valid ASCII, uses another scheme, or carries no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn unauthorized(detail: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": detail })),
    )
        .into_response()
}

/// Rejects requests without a valid bearer token with 401; otherwise stores
/// the [`costlens_auth::AuthContext`] in the request extensions.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return unauthorized("Not authenticated".to_string());
    };

    let result = state.auth.validate(token).await;
    match result {
        Ok(ctx) => {
            tracing::debug!(user = ctx.label(), backend = state.auth.name(), "Request authenticated");
            req.extensions_mut().insert(ctx);
            next.run(req).await
        },
        Err(e) => {
            tracing::debug!(error = %e, backend = state.auth.name(), "Token rejected");
            unauthorized(format!("Could not validate credentials: {}", e))
        },
    }
}
