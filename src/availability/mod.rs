//! Bookable start times derived from weekly availability, breaks and existing bookings.

mod handlers;
mod service;
pub mod slots;

pub use handlers::*;
pub use service::*;
pub use slots::{compute_slots, nearest_slots, slot_starting_at, OccupiedInterval, Slot};

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_availability_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::SERVICE_SLOTS, get(get_slots_handler))
}
