//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, BlockingDbError};

/// Database round-trip plus the state of the optional integrations.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = with_conn(&state.conn, |conn| -> Result<bool, BlockingDbError> {
        Ok(diesel::sql_query("SELECT 1").execute(conn).is_ok())
    })
    .await
    .unwrap_or(false);

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "wecallsmart",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok,
            "voice_platform": state.voice_platform.is_some(),
            "email_transport": state.notifier.transport_name(),
        })),
    )
}

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "wecallsmart",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_reports_ok() {
        let (code, Json(body)) = health_check_simple().await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "wecallsmart");
    }
}
