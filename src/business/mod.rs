//! Business profiles: one row per tenant.

mod error;
mod handlers;
mod service;
mod types;

pub use error::*;
pub use handlers::*;
pub use service::*;
pub use types::*;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_business_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::BUSINESSES,
            get(list_businesses_handler).post(create_business_handler),
        )
        .route(
            ApiUrls::BUSINESS_BY_ID,
            get(get_business_handler)
                .put(update_business_handler)
                .delete(delete_business_handler),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_error_display() {
        assert_eq!(BusinessError::NotFound.to_string(), "Business not found");
        assert_eq!(
            BusinessError::Validation("bad".to_string()).to_string(),
            "Validation error: bad"
        );
    }

    #[test]
    fn test_update_request_defaults_to_no_changes() {
        let request: UpdateBusinessRequest = serde_json::from_str("{}").unwrap();
        assert!(request.name.is_none());
        assert!(request.timezone.is_none());
    }
}
