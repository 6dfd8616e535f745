use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use super::error::VoiceError;
use crate::core::shared::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const BUSINESS_CONTEXT_HEADER: &str = "x-business-context";
pub const BUSINESS_CONTEXT_SIGNATURE_HEADER: &str = "x-business-context-signature";

/// Tenant and call details that travel with every tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
}

impl BusinessContext {
    pub fn new(business_id: Uuid) -> Self {
        Self {
            business_id,
            business_name: None,
            timezone: None,
            call_id: None,
            customer_phone: None,
        }
    }

    /// Header value: base64 of the JSON form.
    pub fn encode(&self) -> Result<String, VoiceError> {
        let json = serde_json::to_vec(self).map_err(|e| VoiceError::InvalidContext(e.to_string()))?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Accepts raw JSON or standard / URL-safe base64 JSON.
    pub fn decode(value: &str) -> Result<Self, VoiceError> {
        let value = value.trim();
        if value.starts_with('{') {
            return serde_json::from_str(value).map_err(|e| VoiceError::InvalidContext(e.to_string()));
        }
        let bytes = general_purpose::STANDARD
            .decode(value)
            .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(value.trim_end_matches('=')))
            .map_err(|e| VoiceError::InvalidContext(format!("not JSON or base64: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| VoiceError::InvalidContext(e.to_string()))
    }

    /// Reads the context header, checking its signature when a signing secret is set.
    pub fn from_headers(headers: &HeaderMap, signing_secret: Option<&str>) -> Result<Self, VoiceError> {
        let value = headers
            .get(BUSINESS_CONTEXT_HEADER)
            .ok_or(VoiceError::MissingContext)?
            .to_str()
            .map_err(|e| VoiceError::InvalidContext(e.to_string()))?;

        if let Some(secret) = signing_secret {
            let signature = headers
                .get(BUSINESS_CONTEXT_SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(VoiceError::InvalidSignature)?;
            if !verify_context_signature(secret, value, signature) {
                return Err(VoiceError::InvalidSignature);
            }
        }
        Self::decode(value)
    }
}

/// Hex HMAC-SHA256 of the header value.
pub fn sign_context(secret: &str, header_value: &str) -> Result<String, VoiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VoiceError::InvalidContext(e.to_string()))?;
    mac.update(header_value.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_context_signature(secret: &str, header_value: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(header_value.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for BusinessContext {
    type Rejection = VoiceError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Self::from_headers(
            &parts.headers,
            state.config.security.context_signing_secret.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn context() -> BusinessContext {
        BusinessContext {
            business_id: Uuid::new_v4(),
            business_name: Some("Bella Salon".to_string()),
            timezone: Some("+02:00".to_string()),
            call_id: Some("call_1".to_string()),
            customer_phone: Some("+15550102030".to_string()),
        }
    }

    #[test]
    fn test_decode_accepts_raw_json_and_base64() {
        let ctx = context();
        let raw = serde_json::to_string(&ctx).unwrap();
        assert_eq!(BusinessContext::decode(&raw).unwrap(), ctx);
        assert_eq!(BusinessContext::decode(&ctx.encode().unwrap()).unwrap(), ctx);
        let url_safe = general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes());
        assert_eq!(BusinessContext::decode(&url_safe).unwrap(), ctx);
    }

    #[test]
    fn test_decode_minimal_context() {
        let id = Uuid::new_v4();
        let ctx = BusinessContext::decode(&format!(r#"{{"business_id":"{id}"}}"#)).unwrap();
        assert_eq!(ctx, BusinessContext::new(id));
        assert!(BusinessContext::decode("{}").is_err());
        assert!(BusinessContext::decode("%%%").is_err());
    }

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let value = context().encode().unwrap();
        let signature = sign_context("secret", &value).unwrap();
        assert!(verify_context_signature("secret", &value, &signature));
        assert!(!verify_context_signature("other", &value, &signature));
        assert!(!verify_context_signature("secret", &format!("{value}x"), &signature));
        assert!(!verify_context_signature("secret", &value, "not-hex"));
    }

    #[test]
    fn test_from_headers_enforces_signature_when_configured() {
        let ctx = context();
        let value = ctx.encode().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(BUSINESS_CONTEXT_HEADER, HeaderValue::from_str(&value).unwrap());

        assert!(BusinessContext::from_headers(&headers, None).is_ok());
        assert!(matches!(
            BusinessContext::from_headers(&headers, Some("secret")),
            Err(VoiceError::InvalidSignature)
        ));

        let signature = sign_context("secret", &value).unwrap();
        headers.insert(
            BUSINESS_CONTEXT_SIGNATURE_HEADER,
            HeaderValue::from_str(&signature).unwrap(),
        );
        assert_eq!(
            BusinessContext::from_headers(&headers, Some("secret")).unwrap(),
            ctx
        );
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            BusinessContext::from_headers(&HeaderMap::new(), None),
            Err(VoiceError::MissingContext)
        ));
    }
}
