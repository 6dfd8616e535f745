use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use super::platform::VoicePlatform;
use super::types::{RemoteAssistant, RemotePhoneNumber};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST client for the Vapi API.
pub struct VapiClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl VapiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Vapi HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Vapi API request: {method} {url}");

        let mut req = self
            .http_client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.context("Failed to send request to Vapi")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read Vapi response body")?;
        Ok((status, text))
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&Value>) -> Result<T> {
        let (status, text) = self.send(method, path, body).await?;
        if !status.is_success() {
            error!("Vapi API error: {status} - {text}");
            return Err(anyhow!("Vapi API error ({status}): {text}"));
        }
        serde_json::from_str(&text).context("Failed to parse Vapi API response")
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (status, text) = self.send(Method::DELETE, path, None).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        error!("Vapi API error: {status} - {text}");
        Err(anyhow!("Vapi API error ({status}): {text}"))
    }
}

#[async_trait]
impl VoicePlatform for VapiClient {
    async fn create_assistant(&self, payload: &Value) -> Result<RemoteAssistant> {
        let created: RemoteAssistant = self.request(Method::POST, "/assistant", Some(payload)).await?;
        info!("Created Vapi assistant {}", created.id);
        Ok(created)
    }

    async fn update_assistant(&self, assistant_id: &str, payload: &Value) -> Result<()> {
        let _: Value = self
            .request(Method::PATCH, &format!("/assistant/{assistant_id}"), Some(payload))
            .await?;
        Ok(())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        self.delete(&format!("/assistant/{assistant_id}")).await
    }

    async fn create_phone_number(&self, payload: &Value) -> Result<RemotePhoneNumber> {
        let created: RemotePhoneNumber = self
            .request(Method::POST, "/phone-number", Some(payload))
            .await?;
        info!("Provisioned Vapi phone number {}", created.id);
        Ok(created)
    }

    async fn attach_phone_number(&self, phone_number_id: &str, assistant_id: &str) -> Result<()> {
        let body = json!({ "assistantId": assistant_id });
        let _: Value = self
            .request(Method::PATCH, &format!("/phone-number/{phone_number_id}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_phone_number(&self, phone_number_id: &str) -> Result<()> {
        self.delete(&format!("/phone-number/{phone_number_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_create_assistant_posts_payload_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/assistant")
            .match_header("authorization", "Bearer vapi-key")
            .match_body(Matcher::PartialJson(json!({ "name": "Bella Salon" })))
            .with_status(201)
            .with_body(r#"{"id":"asst_123","name":"Bella Salon"}"#)
            .create_async()
            .await;

        let client = VapiClient::new(&server.url(), "vapi-key").unwrap();
        let created = client
            .create_assistant(&json!({ "name": "Bella Salon" }))
            .await
            .unwrap();
        assert_eq!(created.id, "asst_123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_assistant_uses_patch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/assistant/asst_123")
            .with_status(200)
            .with_body(r#"{"id":"asst_123"}"#)
            .create_async()
            .await;

        let client = VapiClient::new(&server.url(), "vapi-key").unwrap();
        client
            .update_assistant("asst_123", &json!({ "firstMessage": "Hi" }))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_resource() {
        let mut server = mockito::Server::new_async().await;
        let _gone = server
            .mock("DELETE", "/phone-number/pn_1")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;
        let _broken = server
            .mock("DELETE", "/assistant/asst_1")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = VapiClient::new(&server.url(), "vapi-key").unwrap();
        assert!(client.delete_phone_number("pn_1").await.is_ok());
        let err = client.delete_assistant("asst_1").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_create_phone_number_reads_number() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/phone-number")
            .match_body(Matcher::PartialJson(json!({
                "provider": "vapi",
                "assistantId": "asst_123",
            })))
            .with_status(201)
            .with_body(r#"{"id":"pn_9","number":"+15550102030","provider":"vapi"}"#)
            .create_async()
            .await;

        let client = VapiClient::new(&server.url(), "vapi-key").unwrap();
        let created = client
            .create_phone_number(&json!({ "provider": "vapi", "assistantId": "asst_123" }))
            .await
            .unwrap();
        assert_eq!(created.id, "pn_9");
        assert_eq!(created.number.as_deref(), Some("+15550102030"));
        mock.assert_async().await;
    }
}
