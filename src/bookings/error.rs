use axum::{http::StatusCode, response::IntoResponse, Json};

use super::types::BookingStatus;
use crate::business::BusinessError;
use crate::catalog::CatalogError;
use crate::core::shared::utils::BlockingDbError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Business not found")]
    BusinessNotFound,
    #[error("Service not found")]
    ServiceNotFound,
    #[error("Booking not found")]
    NotFound,
    #[error("{0}")]
    SlotUnavailable(String),
    #[error("Cannot change booking status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for BookingError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound,
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<BlockingDbError> for BookingError {
    fn from(e: BlockingDbError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<BusinessError> for BookingError {
    fn from(e: BusinessError) -> Self {
        match e {
            BusinessError::NotFound => Self::BusinessNotFound,
            BusinessError::Validation(msg) => Self::Validation(msg),
            BusinessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<CatalogError> for BookingError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::BusinessNotFound => Self::BusinessNotFound,
            CatalogError::ServiceNotFound => Self::ServiceNotFound,
            CatalogError::NoAvailability(day) => {
                Self::SlotUnavailable(format!("The service is not offered on {day}"))
            }
            CatalogError::Validation(msg) | CatalogError::Conflict(msg) => Self::Validation(msg),
            CatalogError::BreakNotFound => Self::Validation("Break time not found".to_string()),
            CatalogError::Database(msg) => Self::Database(msg),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::BusinessNotFound | Self::ServiceNotFound | Self::NotFound => StatusCode::NOT_FOUND,
            Self::SlotUnavailable(_) | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
