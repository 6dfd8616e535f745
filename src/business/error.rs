use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::core::shared::utils::BlockingDbError;

#[derive(Debug, thiserror::Error)]
pub enum BusinessError {
    #[error("Business not found")]
    NotFound,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for BusinessError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound,
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<BlockingDbError> for BusinessError {
    fn from(e: BlockingDbError) -> Self {
        Self::Database(e.to_string())
    }
}

impl IntoResponse for BusinessError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
