use axum::{extract::State, http::HeaderMap, Json};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::booker::run_tool;
use super::context::BusinessContext;
use super::error::VoiceError;
use super::tools::Tool;
use super::types::{FunctionCall, WebhookEnvelope, WebhookMessage};
use crate::assistants::{
    assistant_for_phone_number, business_id_for_assistant, business_id_for_phone_number, AssistantError,
};
use crate::business::load_business;
use crate::core::middleware::constant_time_eq;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

pub const VAPI_SECRET_HEADER: &str = "x-vapi-secret";

const NO_BUSINESS_RESULT: &str =
    "I'm sorry, I can't reach this business's booking system right now. Please call back later.";

/// Rejects the request when a webhook secret is configured and the header does not match.
pub fn check_webhook_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), VoiceError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(VAPI_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(VoiceError::Unauthorized)
    }
}

/// Works out which business a call belongs to: assistant metadata, then the
/// assistant id, then the phone number id.
async fn resolve_context(state: &AppState, message: &WebhookMessage) -> Option<BusinessContext> {
    let metadata_id = message.metadata_business_id().and_then(|id| Uuid::parse_str(id).ok());
    let assistant_id = message.assistant_id().map(str::to_string);
    let phone_number_id = message.phone_number_id().map(str::to_string);

    let resolved = with_conn(&state.conn, move |conn| -> Result<_, AssistantError> {
        let business_id = match metadata_id {
            Some(id) => Some(id),
            None => {
                let by_assistant = match &assistant_id {
                    Some(id) => business_id_for_assistant(conn, id)?,
                    None => None,
                };
                match (by_assistant, &phone_number_id) {
                    (Some(id), _) => Some(id),
                    (None, Some(phone)) => business_id_for_phone_number(conn, phone)?,
                    (None, None) => None,
                }
            }
        };
        match business_id {
            Some(id) => Ok(load_business(conn, id).ok()),
            None => Ok(None),
        }
    })
    .await;

    match resolved {
        Ok(Some(business)) => Some(BusinessContext {
            business_id: business.id,
            business_name: Some(business.name),
            timezone: Some(business.timezone),
            call_id: message.call_id().map(str::to_string),
            customer_phone: message.customer_number().map(str::to_string),
        }),
        Ok(None) => {
            warn!(
                "No business for call {} (assistant {:?}, phone number {:?})",
                message.call_id().unwrap_or("-"),
                message.assistant_id(),
                message.phone_number_id()
            );
            None
        }
        Err(e) => {
            warn!("Business lookup failed for call {}: {e}", message.call_id().unwrap_or("-"));
            None
        }
    }
}

async fn dispatch(state: &AppState, ctx: Option<&BusinessContext>, call: &FunctionCall) -> String {
    let Some(ctx) = ctx else {
        return NO_BUSINESS_RESULT.to_string();
    };
    match call.name.parse::<Tool>() {
        Ok(tool) => run_tool(state, ctx, tool, &call.arguments).await,
        Err(name) => {
            warn!("Assistant called unknown tool '{name}'");
            format!("The tool {name} is not available.")
        }
    }
}

/// `POST /api/vapi/webhook`: server messages from the voice platform.
pub async fn vapi_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<Json<Value>, VoiceError> {
    check_webhook_secret(&headers, state.config.voice.webhook_secret.as_deref())?;
    let message = envelope.message;

    match message.kind.as_str() {
        "tool-calls" => {
            let ctx = resolve_context(&state, &message).await;
            let mut results = Vec::with_capacity(message.tool_call_list.len());
            for call in &message.tool_call_list {
                let result = dispatch(&state, ctx.as_ref(), &call.function).await;
                results.push(json!({ "toolCallId": call.id, "result": result }));
            }
            Ok(Json(json!({ "results": results })))
        }
        "function-call" => {
            let Some(call) = &message.function_call else {
                return Ok(Json(json!({ "result": "No function was specified." })));
            };
            let ctx = resolve_context(&state, &message).await;
            let result = dispatch(&state, ctx.as_ref(), call).await;
            Ok(Json(json!({ "result": result })))
        }
        "assistant-request" => {
            let Some(phone_number_id) = message.phone_number_id().map(str::to_string) else {
                return Ok(Json(json!({ "error": "No phone number on the request" })));
            };
            let lookup_id = phone_number_id.clone();
            let assistant = with_conn(&state.conn, move |conn| assistant_for_phone_number(conn, &lookup_id)).await;
            match assistant {
                Ok(Some(assistant_id)) => {
                    info!("Routing phone number {phone_number_id} to assistant {assistant_id}");
                    Ok(Json(json!({ "assistantId": assistant_id })))
                }
                Ok(None) => Ok(Json(json!({ "error": "No assistant is configured for this number" }))),
                Err(e) => {
                    warn!("Assistant lookup failed for phone number {phone_number_id}: {e}");
                    Ok(Json(json!({ "error": "Assistant lookup failed" })))
                }
            }
        }
        "status-update" => {
            info!(
                "Call {} status: {}",
                message.call_id().unwrap_or("-"),
                message.status.as_deref().unwrap_or("unknown")
            );
            Ok(Json(json!({})))
        }
        "end-of-call-report" => {
            info!(
                "Call {} ended: {}",
                message.call_id().unwrap_or("-"),
                message.ended_reason.as_deref().unwrap_or("unknown")
            );
            if let Some(summary) = &message.summary {
                debug!("Call {} summary: {summary}", message.call_id().unwrap_or("-"));
            }
            Ok(Json(json!({})))
        }
        other => {
            debug!("Ignoring webhook message type '{other}'");
            Ok(Json(json!({})))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_secret_not_required_when_unset() {
        assert!(check_webhook_secret(&HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn test_secret_must_match() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            check_webhook_secret(&headers, Some("s3cret")),
            Err(VoiceError::Unauthorized)
        ));
        headers.insert(VAPI_SECRET_HEADER, HeaderValue::from_static("wrong"));
        assert!(check_webhook_secret(&headers, Some("s3cret")).is_err());
        headers.insert(VAPI_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(check_webhook_secret(&headers, Some("s3cret")).is_ok());
    }
}
