use axum::{
    extract::{Path, State},
    Json,
};
use log::info;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::booker::run_tool;
use super::context::BusinessContext;
use super::error::VoiceError;
use super::tools::Tool;
use crate::core::shared::state::AppState;

/// `POST /api/booker/:tool`: runs one tool for the business named in `X-Business-Context`.
pub async fn booker_tool_handler(
    State(state): State<Arc<AppState>>,
    Path(tool): Path<String>,
    ctx: BusinessContext,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, VoiceError> {
    let tool: Tool = tool.parse().map_err(VoiceError::UnknownTool)?;
    let arguments = body
        .map(|Json(v)| v)
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()));

    info!(
        "Tool route {tool} for business {} (call {})",
        ctx.business_id,
        ctx.call_id.as_deref().unwrap_or("-")
    );
    let result = run_tool(&state, &ctx, tool, &arguments).await;
    Ok(Json(json!({ "result": result })))
}
