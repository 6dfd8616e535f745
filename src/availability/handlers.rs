use super::service::{AvailabilityService, DaySlots};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::core::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

pub async fn get_slots_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<DaySlots>, CatalogError> {
    let availability = AvailabilityService::new(state.conn.clone());
    Ok(Json(
        availability
            .available_slots(business_id, service_id, query.date)
            .await?,
    ))
}
