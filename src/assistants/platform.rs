use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::types::{RemoteAssistant, RemotePhoneNumber};

/// Operations this backend needs from the hosted voice-agent platform.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    async fn create_assistant(&self, payload: &Value) -> Result<RemoteAssistant>;

    async fn update_assistant(&self, assistant_id: &str, payload: &Value) -> Result<()>;

    /// Succeeds when the assistant is already gone.
    async fn delete_assistant(&self, assistant_id: &str) -> Result<()>;

    async fn create_phone_number(&self, payload: &Value) -> Result<RemotePhoneNumber>;

    async fn attach_phone_number(&self, phone_number_id: &str, assistant_id: &str) -> Result<()>;

    /// Succeeds when the number is already released.
    async fn delete_phone_number(&self, phone_number_id: &str) -> Result<()>;
}
