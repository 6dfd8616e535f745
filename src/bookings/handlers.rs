use super::error::BookingError;
use super::service::BookingService;
use super::types::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;

fn booking_service(state: &AppState) -> BookingService {
    BookingService::new(state.conn.clone(), Arc::clone(&state.notifier))
}

pub async fn list_bookings_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    tracing::debug!("Listing bookings: business={business_id}, from={:?}, to={:?}", query.from, query.to);
    Ok(Json(
        booking_service(&state)
            .list_bookings(business_id, query)
            .await?,
    ))
}

pub async fn create_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), BookingError> {
    tracing::debug!("Creating booking for business {business_id} on {}", request.booking_date);
    let booking = booking_service(&state)
        .create_booking(business_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(
        booking_service(&state)
            .get_booking(business_id, booking_id)
            .await?,
    ))
}

pub async fn update_booking_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, booking_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(
        booking_service(&state)
            .update_booking(business_id, booking_id, request)
            .await?,
    ))
}

pub async fn set_booking_status_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, booking_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(
        booking_service(&state)
            .set_status(business_id, booking_id, request.status)
            .await?,
    ))
}

pub async fn cancel_booking_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, booking_id)): Path<(Uuid, Uuid)>,
    request: Option<Json<CancelBookingRequest>>,
) -> Result<Json<Booking>, BookingError> {
    let reason = request.and_then(|Json(r)| r.reason);
    Ok(Json(
        booking_service(&state)
            .cancel_booking(business_id, booking_id, reason)
            .await?,
    ))
}
