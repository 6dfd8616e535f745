use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::business::BusinessError;
use crate::catalog::CatalogError;
use crate::core::shared::utils::BlockingDbError;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Business not found")]
    BusinessNotFound,
    #[error("Assistant configuration not found")]
    ConfigNotFound,
    #[error("No assistant has been published for this business")]
    AssistantNotFound,
    #[error("No phone number is provisioned for this business")]
    PhoneNumberNotFound,
    #[error("Voice platform is not configured")]
    PlatformUnavailable,
    #[error("Voice platform error: {0}")]
    Platform(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for AssistantError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(info.message().to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<BlockingDbError> for AssistantError {
    fn from(e: BlockingDbError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<BusinessError> for AssistantError {
    fn from(e: BusinessError) -> Self {
        match e {
            BusinessError::NotFound => Self::BusinessNotFound,
            BusinessError::Validation(msg) => Self::Validation(msg),
            BusinessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<CatalogError> for AssistantError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::BusinessNotFound => Self::BusinessNotFound,
            CatalogError::Database(msg) => Self::Database(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::BusinessNotFound
            | Self::ConfigNotFound
            | Self::AssistantNotFound
            | Self::PhoneNumberNotFound => StatusCode::NOT_FOUND,
            Self::PlatformUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Platform(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
