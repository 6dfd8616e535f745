use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MODEL_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_VOICE_PROVIDER: &str = "11labs";
pub const DEFAULT_VOICE_ID: &str = "burt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub model_provider: String,
    pub model: String,
    pub voice_provider: String,
    pub voice_id: String,
    pub first_message: String,
    /// Custom prompt; when absent one is generated from the business profile.
    pub system_prompt: Option<String>,
    pub end_call_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertAssistantConfigRequest {
    pub name: Option<String>,
    pub model_provider: Option<String>,
    pub model: Option<String>,
    pub voice_provider: Option<String>,
    pub voice_id: Option<String>,
    pub first_message: Option<String>,
    pub system_prompt: Option<String>,
    pub end_call_message: Option<String>,
}

/// Assistant published on the voice platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: Uuid,
    pub business_id: Uuid,
    pub config_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: Uuid,
    pub business_id: Uuid,
    pub assistant_id: Option<Uuid>,
    pub external_id: String,
    pub number: Option<String>,
    pub provider: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionPhoneNumberRequest {
    pub name: Option<String>,
    /// Three-digit area code requested from the platform's free number pool.
    pub area_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub assistant: Assistant,
    pub created: bool,
}

/// Identifiers the voice platform returns for a created resource.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAssistant {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePhoneNumber {
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
}
