use super::error::AssistantError;
use super::service::AssistantService;
use super::types::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;

fn assistant_service(state: &AppState) -> AssistantService {
    AssistantService::new(
        state.conn.clone(),
        state.voice_platform.clone(),
        Arc::clone(&state.config),
    )
}

pub async fn get_assistant_config_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<AssistantConfig>, AssistantError> {
    Ok(Json(assistant_service(&state).get_config(business_id).await?))
}

pub async fn upsert_assistant_config_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<UpsertAssistantConfigRequest>,
) -> Result<Json<AssistantConfig>, AssistantError> {
    Ok(Json(
        assistant_service(&state)
            .upsert_config(business_id, request)
            .await?,
    ))
}

pub async fn publish_assistant_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PublishResult>), AssistantError> {
    let result = assistant_service(&state)
        .publish_assistant(business_id)
        .await?;
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

pub async fn get_assistant_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Assistant>, AssistantError> {
    Ok(Json(assistant_service(&state).get_assistant(business_id).await?))
}

pub async fn delete_assistant_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<StatusCode, AssistantError> {
    assistant_service(&state).delete_assistant(business_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_phone_number_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<PhoneNumber>, AssistantError> {
    Ok(Json(
        assistant_service(&state)
            .get_phone_number(business_id)
            .await?,
    ))
}

pub async fn provision_phone_number_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
    request: Option<Json<ProvisionPhoneNumberRequest>>,
) -> Result<(StatusCode, Json<PhoneNumber>), AssistantError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let phone = assistant_service(&state)
        .provision_phone_number(business_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(phone)))
}

pub async fn release_phone_number_handler(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<Uuid>,
) -> Result<StatusCode, AssistantError> {
    assistant_service(&state)
        .release_phone_number(business_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
