use super::error::BusinessError;
use super::service::BusinessService;
use super::types::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;

pub async fn list_businesses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BusinessListQuery>,
) -> Result<Json<Vec<BusinessProfile>>, BusinessError> {
    let service = BusinessService::new(state.conn.clone());
    Ok(Json(service.list_businesses(query).await?))
}

pub async fn create_business_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<BusinessProfile>), BusinessError> {
    let service = BusinessService::new(state.conn.clone());
    let business = service.create_business(request).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn get_business_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<BusinessProfile>, BusinessError> {
    let service = BusinessService::new(state.conn.clone());
    Ok(Json(service.get_business(business_id).await?))
}

pub async fn update_business_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<UpdateBusinessRequest>,
) -> Result<Json<BusinessProfile>, BusinessError> {
    let service = BusinessService::new(state.conn.clone());
    Ok(Json(service.update_business(business_id, request).await?))
}

pub async fn delete_business_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<StatusCode, BusinessError> {
    let service = BusinessService::new(state.conn.clone());
    service.delete_business(business_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
