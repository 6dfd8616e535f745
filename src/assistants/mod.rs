//! Voice assistants and phone numbers hosted on the voice-agent platform.

mod error;
mod handlers;
mod platform;
pub mod prompt;
mod service;
mod types;
mod vapi_client;

pub use error::*;
pub use handlers::*;
pub use platform::VoicePlatform;
pub use service::*;
pub use types::*;
pub use vapi_client::VapiClient;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_assistant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::ASSISTANT,
            get(get_assistant_handler).delete(delete_assistant_handler),
        )
        .route(
            ApiUrls::ASSISTANT_CONFIG,
            get(get_assistant_config_handler).put(upsert_assistant_config_handler),
        )
        .route(ApiUrls::ASSISTANT_PUBLISH, post(publish_assistant_handler))
        .route(
            ApiUrls::PHONE_NUMBER,
            get(get_phone_number_handler)
                .post(provision_phone_number_handler)
                .delete(release_phone_number_handler),
        )
}
