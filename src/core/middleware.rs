use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;

/// Guards the dashboard API with the configured `ADMIN_API_TOKEN` bearer token.
///
/// Without a token the API is only served when `ALLOW_OPEN_DASHBOARD` is set.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.security.admin_api_token.as_deref() else {
        if state.config.security.allow_open_dashboard {
            return next.run(req).await;
        }
        return unauthorized("Dashboard API token is not configured");
    };

    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(req).await
        }
        Some(_) => {
            warn!("Rejected dashboard request to {} with invalid token", req.uri().path());
            unauthorized("Invalid API token")
        }
        None => unauthorized("Missing bearer token"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Byte comparison whose duration does not depend on where the inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
