use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::business::BusinessError;
use crate::core::shared::utils::BlockingDbError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Business not found")]
    BusinessNotFound,
    #[error("Service not found")]
    ServiceNotFound,
    #[error("Break time not found")]
    BreakNotFound,
    #[error("No availability configured for {0}")]
    NoAvailability(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for CatalogError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => Self::ServiceNotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(info.message().to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Conflict(info.message().to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<BlockingDbError> for CatalogError {
    fn from(e: BlockingDbError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<BusinessError> for CatalogError {
    fn from(e: BusinessError) -> Self {
        match e {
            BusinessError::NotFound => Self::BusinessNotFound,
            BusinessError::Validation(msg) => Self::Validation(msg),
            BusinessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::BusinessNotFound | Self::ServiceNotFound | Self::BreakNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::NoAvailability(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
