//! Voice-platform surface: the webhook, the per-tool booker routes and the tools themselves.

mod booker;
mod context;
mod error;
mod handlers;
pub mod parse;
mod tools;
mod types;
mod webhook;

pub use booker::run_tool;
pub use context::*;
pub use error::*;
pub use handlers::*;
pub use tools::{tool_definitions, Tool};
pub use types::*;
pub use webhook::*;

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

/// Public routes called by the voice platform; they authenticate with the webhook
/// secret and the signed business context instead of the admin token.
pub fn configure_voice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::VAPI_WEBHOOK, post(vapi_webhook_handler))
        .route(ApiUrls::BOOKER_TOOL, post(booker_tool_handler))
}
