use super::error::CatalogError;
use super::service::CatalogService;
use super::types::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;

pub async fn list_services_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Vec<Service>>, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    Ok(Json(catalog.list_services(business_id, query).await?))
}

pub async fn create_service_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), CatalogError> {
    tracing::debug!("Creating service '{}' for business {business_id}", request.name);
    let catalog = CatalogService::new(state.conn.clone());
    let service = catalog.create_service(business_id, request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn get_service_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Service>, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    Ok(Json(catalog.get_service(business_id, service_id).await?))
}

pub async fn update_service_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Service>, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    Ok(Json(
        catalog.update_service(business_id, service_id, request).await?,
    ))
}

pub async fn delete_service_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    catalog.delete_service(business_id, service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_availability_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<AvailabilityWindow>>, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    Ok(Json(catalog.get_availability(business_id, service_id).await?))
}

pub async fn set_availability_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Vec<AvailabilityWindow>>, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    Ok(Json(
        catalog
            .set_availability(business_id, service_id, request)
            .await?,
    ))
}

pub async fn add_break_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<AddBreakRequest>,
) -> Result<(StatusCode, Json<BreakTime>), CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    let created = catalog
        .add_break_time(business_id, service_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_break_handler(
    State(state): State<Arc<AppState>>,
    Path((business_id, service_id, break_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode, CatalogError> {
    let catalog = CatalogService::new(state.conn.clone());
    catalog
        .delete_break_time(business_id, service_id, break_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
