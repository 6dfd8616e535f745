//! Services a business offers, their weekly availability and break times.

mod error;
mod handlers;
mod service;
mod types;

pub use error::*;
pub use handlers::*;
pub use service::*;
pub use types::*;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::SERVICES,
            get(list_services_handler).post(create_service_handler),
        )
        .route(
            ApiUrls::SERVICE_BY_ID,
            get(get_service_handler)
                .put(update_service_handler)
                .delete(delete_service_handler),
        )
        .route(
            ApiUrls::SERVICE_AVAILABILITY,
            get(get_availability_handler).put(set_availability_handler),
        )
        .route(ApiUrls::SERVICE_BREAKS, post(add_break_handler))
        .route(ApiUrls::SERVICE_BREAK_BY_ID, delete(delete_break_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_availability_request_defaults_breaks() {
        let request: SetAvailabilityRequest = serde_json::from_str(
            r#"{"days":[{"day_of_week":1,"open_time":"09:00","close_time":"17:00"}]}"#,
        )
        .unwrap();
        assert_eq!(request.days.len(), 1);
        assert!(request.days[0].breaks.is_empty());
        assert!(request.days[0].max_concurrent.is_none());
    }

    #[test]
    fn test_create_service_request_accepts_decimal_price() {
        let request: CreateServiceRequest = serde_json::from_str(
            r#"{"name":"Beard trim","price":"15.50","duration_minutes":20}"#,
        )
        .unwrap();
        assert_eq!(request.price.unwrap().to_string(), "15.50");
    }

    #[test]
    fn test_catalog_error_status_text() {
        assert_eq!(
            CatalogError::NoAvailability("Sunday".to_string()).to_string(),
            "No availability configured for Sunday"
        );
    }
}
