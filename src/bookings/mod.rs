//! Customer bookings: creation against open slots, rescheduling and the status lifecycle.

mod error;
mod handlers;
mod service;
mod types;

pub use error::*;
pub use handlers::*;
pub use service::*;
pub use types::*;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_booking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::BOOKINGS,
            get(list_bookings_handler).post(create_booking_handler),
        )
        .route(
            ApiUrls::BOOKING_BY_ID,
            get(get_booking_handler).patch(update_booking_handler),
        )
        .route(ApiUrls::BOOKING_STATUS, put(set_booking_status_handler))
        .route(ApiUrls::BOOKING_CANCEL, post(cancel_booking_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    #[test]
    fn test_allowed_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in [BookingStatus::Cancelled, BookingStatus::Completed] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_only_active_statuses_hold_capacity() {
        let holding: Vec<_> = ALL.iter().filter(|s| s.occupies_capacity()).collect();
        assert_eq!(holding, vec![&BookingStatus::Pending, &BookingStatus::Confirmed]);
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert_eq!("Canceled".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert!("archived".parse::<BookingStatus>().is_err());
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = BookingError::InvalidTransition {
            from: BookingStatus::Completed,
            to: BookingStatus::Pending,
        };
        assert_eq!(err.to_string(), "Cannot change booking status from completed to pending");
    }
}
