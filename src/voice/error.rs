use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::bookings::BookingError;
use crate::business::BusinessError;
use crate::catalog::CatalogError;

/// Failures of the voice-platform HTTP surface itself.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Missing X-Business-Context header")]
    MissingContext,
    #[error("Invalid business context: {0}")]
    InvalidContext(String),
    #[error("Invalid business context signature")]
    InvalidSignature,
    #[error("Invalid webhook secret")]
    Unauthorized,
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::MissingContext | Self::InvalidContext(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownTool(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failure inside a tool call. Always rendered as a sentence for the caller.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Arguments(String),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Business(#[from] BusinessError),
}

const APOLOGY: &str =
    "I'm sorry, I'm having trouble reaching the booking system right now. Please try again in a moment.";

impl ToolError {
    /// Whether the message is safe and useful to read to a caller.
    pub fn is_caller_facing(&self) -> bool {
        match self {
            Self::Arguments(_) => true,
            Self::Booking(e) => !matches!(e, BookingError::Database(_)),
            Self::Catalog(e) => !matches!(e, CatalogError::Database(_)),
            Self::Business(e) => !matches!(e, BusinessError::Database(_)),
        }
    }

    pub fn spoken(&self) -> String {
        if !self.is_caller_facing() {
            return APOLOGY.to_string();
        }
        match self {
            Self::Booking(BookingError::NotFound) => {
                "I couldn't find that booking. Could you confirm the booking reference or the phone number it was made with?".to_string()
            }
            Self::Booking(BookingError::InvalidTransition { from, .. }) => {
                format!("That booking is already {from}, so it can't be changed.")
            }
            Self::Booking(BookingError::Validation(msg))
            | Self::Catalog(CatalogError::Validation(msg))
            | Self::Business(BusinessError::Validation(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::BookingStatus;

    #[test]
    fn test_database_errors_become_apology() {
        let err = ToolError::from(BookingError::Database("connection refused".to_string()));
        assert!(!err.is_caller_facing());
        assert!(!err.spoken().contains("connection refused"));
        assert!(err.spoken().starts_with("I'm sorry"));
    }

    #[test]
    fn test_slot_message_reaches_caller() {
        let err = ToolError::from(BookingError::SlotUnavailable(
            "3:00 PM is not available. Nearest open times: 2:00 PM".to_string(),
        ));
        assert_eq!(err.spoken(), "3:00 PM is not available. Nearest open times: 2:00 PM");
    }

    #[test]
    fn test_transition_message() {
        let err = ToolError::from(BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Cancelled,
        });
        assert_eq!(err.spoken(), "That booking is already cancelled, so it can't be changed.");
    }
}
