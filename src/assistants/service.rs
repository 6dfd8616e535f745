use super::error::AssistantError;
use super::platform::VoicePlatform;
use super::prompt::{build_assistant_payload, build_system_prompt, default_first_message};
use super::types::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text, Timestamptz, Uuid as DieselUuid};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::business::load_business;
use crate::catalog::{load_services, ServiceListQuery};
use crate::core::config::AppConfig;
use crate::core::shared::utils::{non_empty, with_conn, DbPool};

#[derive(QueryableByName)]
struct ConfigRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    model_provider: String,
    #[diesel(sql_type = Text)]
    model: String,
    #[diesel(sql_type = Text)]
    voice_provider: String,
    #[diesel(sql_type = Text)]
    voice_id: String,
    #[diesel(sql_type = Text)]
    first_message: String,
    #[diesel(sql_type = Nullable<Text>)]
    system_prompt: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    end_call_message: Option<String>,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for AssistantConfig {
    fn from(row: ConfigRow) -> Self {
        Self {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            model_provider: row.model_provider,
            model: row.model,
            voice_provider: row.voice_provider,
            voice_id: row.voice_id,
            first_message: row.first_message,
            system_prompt: row.system_prompt,
            end_call_message: row.end_call_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(QueryableByName)]
struct AssistantRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    config_id: Uuid,
    #[diesel(sql_type = Text)]
    external_id: String,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl From<AssistantRow> for Assistant {
    fn from(row: AssistantRow) -> Self {
        Self {
            id: row.id,
            business_id: row.business_id,
            config_id: row.config_id,
            external_id: row.external_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(QueryableByName)]
struct PhoneRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
    #[diesel(sql_type = Nullable<DieselUuid>)]
    assistant_id: Option<Uuid>,
    #[diesel(sql_type = Text)]
    external_id: String,
    #[diesel(sql_type = Nullable<Text>)]
    number: Option<String>,
    #[diesel(sql_type = Text)]
    provider: String,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
}

impl From<PhoneRow> for PhoneNumber {
    fn from(row: PhoneRow) -> Self {
        Self {
            id: row.id,
            business_id: row.business_id,
            assistant_id: row.assistant_id,
            external_id: row.external_id,
            number: row.number,
            provider: row.provider,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(QueryableByName)]
struct BusinessIdRow {
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
}

#[derive(QueryableByName)]
struct ExternalIdRow {
    #[diesel(sql_type = Text)]
    external_id: String,
}

const CONFIG_COLUMNS: &str = "id, business_id, name, model_provider, model, voice_provider, voice_id, first_message, system_prompt, end_call_message, created_at, updated_at";
const ASSISTANT_COLUMNS: &str = "id, business_id, config_id, external_id, name, created_at, updated_at";
const PHONE_COLUMNS: &str = "id, business_id, assistant_id, external_id, number, provider, name, created_at";

pub fn load_config(conn: &mut PgConnection, business_id: Uuid) -> Result<Option<AssistantConfig>, AssistantError> {
    let rows: Vec<ConfigRow> = diesel::sql_query(format!(
        "SELECT {CONFIG_COLUMNS} FROM assistant_configs WHERE business_id = $1"
    ))
    .bind::<DieselUuid, _>(business_id)
    .load(conn)?;
    Ok(rows.into_iter().next().map(AssistantConfig::from))
}

pub fn load_assistant(conn: &mut PgConnection, business_id: Uuid) -> Result<Option<Assistant>, AssistantError> {
    let rows: Vec<AssistantRow> = diesel::sql_query(format!(
        "SELECT {ASSISTANT_COLUMNS} FROM assistants WHERE business_id = $1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind::<DieselUuid, _>(business_id)
    .load(conn)?;
    Ok(rows.into_iter().next().map(Assistant::from))
}

pub fn load_phone_number(conn: &mut PgConnection, business_id: Uuid) -> Result<Option<PhoneNumber>, AssistantError> {
    let rows: Vec<PhoneRow> = diesel::sql_query(format!(
        "SELECT {PHONE_COLUMNS} FROM phone_numbers WHERE business_id = $1"
    ))
    .bind::<DieselUuid, _>(business_id)
    .load(conn)?;
    Ok(rows.into_iter().next().map(PhoneNumber::from))
}

/// Business owning a platform assistant id.
pub fn business_id_for_assistant(conn: &mut PgConnection, external_id: &str) -> Result<Option<Uuid>, AssistantError> {
    let rows: Vec<BusinessIdRow> =
        diesel::sql_query("SELECT business_id FROM assistants WHERE external_id = $1")
            .bind::<Text, _>(external_id)
            .load(conn)?;
    Ok(rows.into_iter().next().map(|r| r.business_id))
}

/// Business owning a platform phone number id.
pub fn business_id_for_phone_number(conn: &mut PgConnection, external_id: &str) -> Result<Option<Uuid>, AssistantError> {
    let rows: Vec<BusinessIdRow> =
        diesel::sql_query("SELECT business_id FROM phone_numbers WHERE external_id = $1")
            .bind::<Text, _>(external_id)
            .load(conn)?;
    Ok(rows.into_iter().next().map(|r| r.business_id))
}

/// Platform assistant id that should answer calls to a phone number: the attached
/// assistant, else the latest assistant of the number's business.
pub fn assistant_for_phone_number(conn: &mut PgConnection, phone_external_id: &str) -> Result<Option<String>, AssistantError> {
    let rows: Vec<ExternalIdRow> = diesel::sql_query(
        r#"
        SELECT a.external_id FROM phone_numbers p
        JOIN assistants a ON a.id = p.assistant_id OR (p.assistant_id IS NULL AND a.business_id = p.business_id)
        WHERE p.external_id = $1
        ORDER BY (a.id = p.assistant_id) DESC NULLS LAST, a.created_at DESC
        LIMIT 1
        "#,
    )
    .bind::<Text, _>(phone_external_id)
    .load(conn)?;
    Ok(rows.into_iter().next().map(|r| r.external_id))
}

fn set_phone_assistant(conn: &mut PgConnection, phone_id: Uuid, assistant_id: Option<Uuid>) -> Result<(), AssistantError> {
    diesel::sql_query("UPDATE phone_numbers SET assistant_id = $2 WHERE id = $1")
        .bind::<DieselUuid, _>(phone_id)
        .bind::<Nullable<DieselUuid>, _>(assistant_id)
        .execute(conn)?;
    Ok(())
}

fn platform_error(e: anyhow::Error) -> AssistantError {
    AssistantError::Platform(e.to_string())
}

fn validate_area_code(value: Option<String>) -> Result<Option<String>, AssistantError> {
    match non_empty(value) {
        Some(code) if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) => Err(
            AssistantError::Validation(format!("Area code must be three digits, got '{code}'")),
        ),
        other => Ok(other),
    }
}

pub struct AssistantService {
    pool: DbPool,
    platform: Option<Arc<dyn VoicePlatform>>,
    config: Arc<AppConfig>,
}

impl AssistantService {
    pub fn new(pool: DbPool, platform: Option<Arc<dyn VoicePlatform>>, config: Arc<AppConfig>) -> Self {
        Self { pool, platform, config }
    }

    fn platform(&self) -> Result<&Arc<dyn VoicePlatform>, AssistantError> {
        self.platform.as_ref().ok_or(AssistantError::PlatformUnavailable)
    }

    pub async fn get_config(&self, business_id: Uuid) -> Result<AssistantConfig, AssistantError> {
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            load_business(conn, business_id)?;
            load_config(conn, business_id)?.ok_or(AssistantError::ConfigNotFound)
        })
        .await
    }

    /// Creates or partially updates the assistant configuration of a business.
    pub async fn upsert_config(
        &self,
        business_id: Uuid,
        request: UpsertAssistantConfigRequest,
    ) -> Result<AssistantConfig, AssistantError> {
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            let business = load_business(conn, business_id)?;
            let current = load_config(conn, business_id)?;

            let pick = |value: Option<String>, existing: Option<String>, default: &str| {
                non_empty(value)
                    .or(existing)
                    .unwrap_or_else(|| default.to_string())
            };
            let name = pick(request.name, current.as_ref().map(|c| c.name.clone()), &business.name);
            let model_provider = pick(
                request.model_provider,
                current.as_ref().map(|c| c.model_provider.clone()),
                DEFAULT_MODEL_PROVIDER,
            );
            let model = pick(request.model, current.as_ref().map(|c| c.model.clone()), DEFAULT_MODEL);
            let voice_provider = pick(
                request.voice_provider,
                current.as_ref().map(|c| c.voice_provider.clone()),
                DEFAULT_VOICE_PROVIDER,
            );
            let voice_id = pick(request.voice_id, current.as_ref().map(|c| c.voice_id.clone()), DEFAULT_VOICE_ID);
            let first_message = pick(
                request.first_message,
                current.as_ref().map(|c| c.first_message.clone()),
                &default_first_message(&business.name),
            );
            let system_prompt = match request.system_prompt {
                Some(p) => non_empty(Some(p)),
                None => current.as_ref().and_then(|c| c.system_prompt.clone()),
            };
            let end_call_message = match request.end_call_message {
                Some(m) => non_empty(Some(m)),
                None => current.as_ref().and_then(|c| c.end_call_message.clone()),
            };

            diesel::sql_query(
                r#"
                INSERT INTO assistant_configs (
                    id, business_id, name, model_provider, model, voice_provider, voice_id,
                    first_message, system_prompt, end_call_message, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
                ON CONFLICT (business_id) DO UPDATE
                SET name = EXCLUDED.name,
                    model_provider = EXCLUDED.model_provider,
                    model = EXCLUDED.model,
                    voice_provider = EXCLUDED.voice_provider,
                    voice_id = EXCLUDED.voice_id,
                    first_message = EXCLUDED.first_message,
                    system_prompt = EXCLUDED.system_prompt,
                    end_call_message = EXCLUDED.end_call_message,
                    updated_at = NOW()
                "#,
            )
            .bind::<DieselUuid, _>(Uuid::new_v4())
            .bind::<DieselUuid, _>(business_id)
            .bind::<Text, _>(&name)
            .bind::<Text, _>(&model_provider)
            .bind::<Text, _>(&model)
            .bind::<Text, _>(&voice_provider)
            .bind::<Text, _>(&voice_id)
            .bind::<Text, _>(&first_message)
            .bind::<Nullable<Text>, _>(system_prompt.as_deref())
            .bind::<Nullable<Text>, _>(end_call_message.as_deref())
            .execute(conn)?;

            load_config(conn, business_id)?.ok_or(AssistantError::ConfigNotFound)
        })
        .await
    }

    /// Creates the assistant on the voice platform, or pushes the current configuration
    /// to the one already published, and points the business's phone number at it.
    pub async fn publish_assistant(&self, business_id: Uuid) -> Result<PublishResult, AssistantError> {
        let platform = Arc::clone(self.platform()?);

        let config = match with_conn(&self.pool, move |conn| load_config(conn, business_id)).await? {
            Some(config) => config,
            None => {
                self.upsert_config(business_id, UpsertAssistantConfigRequest::default())
                    .await?
            }
        };

        let (business, services, existing, phone) = with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            let business = load_business(conn, business_id)?;
            let query = ServiceListQuery {
                active_only: Some(true),
                category: None,
            };
            let services = load_services(conn, business_id, &query)?;
            Ok((
                business,
                services,
                load_assistant(conn, business_id)?,
                load_phone_number(conn, business_id)?,
            ))
        })
        .await?;

        let prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| build_system_prompt(&business, &services));
        let payload = build_assistant_payload(
            &config,
            &prompt,
            &self.config.webhook_url(),
            self.config.voice.webhook_secret.as_deref(),
        );

        let (assistant, created) = match existing {
            Some(existing) => {
                platform
                    .update_assistant(&existing.external_id, &payload)
                    .await
                    .map_err(platform_error)?;
                let config_id = config.id;
                let name = config.name.clone();
                let assistant_id = existing.id;
                let assistant = with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
                    diesel::sql_query(
                        "UPDATE assistants SET name = $2, config_id = $3, updated_at = NOW() WHERE id = $1",
                    )
                    .bind::<DieselUuid, _>(assistant_id)
                    .bind::<Text, _>(&name)
                    .bind::<DieselUuid, _>(config_id)
                    .execute(conn)?;
                    load_assistant(conn, business_id)?.ok_or(AssistantError::AssistantNotFound)
                })
                .await?;
                (assistant, false)
            }
            None => {
                let remote = platform.create_assistant(&payload).await.map_err(platform_error)?;
                let external_id = remote.id.clone();
                let config_id = config.id;
                let name = config.name.clone();
                let inserted = with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
                    diesel::sql_query(
                        r#"
                        INSERT INTO assistants (id, business_id, config_id, external_id, name, created_at, updated_at)
                        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
                        "#,
                    )
                    .bind::<DieselUuid, _>(Uuid::new_v4())
                    .bind::<DieselUuid, _>(business_id)
                    .bind::<DieselUuid, _>(config_id)
                    .bind::<Text, _>(&external_id)
                    .bind::<Text, _>(&name)
                    .execute(conn)?;
                    load_assistant(conn, business_id)?.ok_or(AssistantError::AssistantNotFound)
                })
                .await;

                match inserted {
                    Ok(assistant) => (assistant, true),
                    Err(e) => {
                        error!("Failed to record assistant {} for business {business_id}: {e}", remote.id);
                        if let Err(cleanup) = platform.delete_assistant(&remote.id).await {
                            warn!("Could not remove orphaned assistant {}: {cleanup}", remote.id);
                        }
                        return Err(e);
                    }
                }
            }
        };

        if let Some(phone) = phone.filter(|p| p.assistant_id != Some(assistant.id)) {
            platform
                .attach_phone_number(&phone.external_id, &assistant.external_id)
                .await
                .map_err(platform_error)?;
            let assistant_id = assistant.id;
            with_conn(&self.pool, move |conn| set_phone_assistant(conn, phone.id, Some(assistant_id))).await?;
        }

        info!(
            "{} assistant {} for business {business_id}",
            if created { "Published" } else { "Updated" },
            assistant.external_id
        );
        Ok(PublishResult { assistant, created })
    }

    pub async fn get_assistant(&self, business_id: Uuid) -> Result<Assistant, AssistantError> {
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            load_business(conn, business_id)?;
            load_assistant(conn, business_id)?.ok_or(AssistantError::AssistantNotFound)
        })
        .await
    }

    pub async fn delete_assistant(&self, business_id: Uuid) -> Result<(), AssistantError> {
        let platform = Arc::clone(self.platform()?);
        let assistant = self.get_assistant(business_id).await?;

        platform
            .delete_assistant(&assistant.external_id)
            .await
            .map_err(platform_error)?;
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            diesel::sql_query("DELETE FROM assistants WHERE id = $1 AND business_id = $2")
                .bind::<DieselUuid, _>(assistant.id)
                .bind::<DieselUuid, _>(business_id)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        info!("Deleted assistant {} of business {business_id}", assistant.external_id);
        Ok(())
    }

    /// Buys a number on the voice platform for a business that has none yet.
    pub async fn provision_phone_number(
        &self,
        business_id: Uuid,
        request: ProvisionPhoneNumberRequest,
    ) -> Result<PhoneNumber, AssistantError> {
        let platform = Arc::clone(self.platform()?);
        let area_code = validate_area_code(request.area_code)?;

        let (business, existing, assistant) = with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            Ok((
                load_business(conn, business_id)?,
                load_phone_number(conn, business_id)?,
                load_assistant(conn, business_id)?,
            ))
        })
        .await?;
        if existing.is_some() {
            return Err(AssistantError::Conflict(
                "This business already has a phone number".to_string(),
            ));
        }

        let name = non_empty(request.name).unwrap_or_else(|| business.name.clone());
        let mut server = json!({ "url": self.config.webhook_url() });
        if let Some(secret) = &self.config.voice.webhook_secret {
            server["secret"] = json!(secret);
        }
        let mut payload = json!({
            "provider": "vapi",
            "name": name,
            "server": server,
        });
        if let Some(assistant) = &assistant {
            payload["assistantId"] = json!(assistant.external_id);
        }
        if let Some(code) = &area_code {
            payload["numberDesiredAreaCode"] = json!(code);
        }

        let remote = platform.create_phone_number(&payload).await.map_err(platform_error)?;
        let external_id = remote.id.clone();
        let number = remote.number.clone();
        let assistant_id = assistant.map(|a| a.id);
        let inserted = with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            diesel::sql_query(
                r#"
                INSERT INTO phone_numbers (id, business_id, assistant_id, external_id, number, provider, name, created_at)
                VALUES ($1, $2, $3, $4, $5, 'vapi', $6, NOW())
                "#,
            )
            .bind::<DieselUuid, _>(Uuid::new_v4())
            .bind::<DieselUuid, _>(business_id)
            .bind::<Nullable<DieselUuid>, _>(assistant_id)
            .bind::<Text, _>(&external_id)
            .bind::<Nullable<Text>, _>(number.as_deref())
            .bind::<Text, _>(&name)
            .execute(conn)?;
            load_phone_number(conn, business_id)?.ok_or(AssistantError::PhoneNumberNotFound)
        })
        .await;

        match inserted {
            Ok(phone) => {
                info!(
                    "Provisioned phone number {} for business {business_id}",
                    phone.number.as_deref().unwrap_or(&phone.external_id)
                );
                Ok(phone)
            }
            Err(e) => {
                error!("Failed to record phone number {} for business {business_id}: {e}", remote.id);
                if let Err(cleanup) = platform.delete_phone_number(&remote.id).await {
                    warn!("Could not release orphaned phone number {}: {cleanup}", remote.id);
                }
                Err(e)
            }
        }
    }

    pub async fn get_phone_number(&self, business_id: Uuid) -> Result<PhoneNumber, AssistantError> {
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            load_business(conn, business_id)?;
            load_phone_number(conn, business_id)?.ok_or(AssistantError::PhoneNumberNotFound)
        })
        .await
    }

    pub async fn release_phone_number(&self, business_id: Uuid) -> Result<(), AssistantError> {
        let platform = Arc::clone(self.platform()?);
        let phone = self.get_phone_number(business_id).await?;

        platform
            .delete_phone_number(&phone.external_id)
            .await
            .map_err(platform_error)?;
        with_conn(&self.pool, move |conn| -> Result<_, AssistantError> {
            diesel::sql_query("DELETE FROM phone_numbers WHERE id = $1 AND business_id = $2")
                .bind::<DieselUuid, _>(phone.id)
                .bind::<DieselUuid, _>(business_id)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        info!("Released phone number {} of business {business_id}", phone.external_id);
        Ok(())
    }
}
