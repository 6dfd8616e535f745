use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{EmailConfig, EmailProvider};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Transactional email HTTP API (`POST {base}/emails`, bearer key).
pub struct ApiTransport {
    http_client: Client,
    api_url: String,
    api_key: String,
}

impl ApiTransport {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build email HTTP client")?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl EmailTransport for ApiTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let url = format!("{}/emails", self.api_url);
        let mut body = json!({
            "from": email.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });
        if let Some(reply_to) = &email.reply_to {
            body["reply_to"] = json!(reply_to);
        }
        debug!("Email API request: POST {url}");

        let resp = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to email API")?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Email API error: {status} - {error_text}");
            return Err(anyhow!("Email API error ({status}): {error_text}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[cfg(feature = "mail")]
pub struct SmtpTransport {
    host: String,
    user: Option<String>,
    pass: Option<String>,
}

#[cfg(feature = "mail")]
impl SmtpTransport {
    pub fn new(host: &str, user: Option<String>, pass: Option<String>) -> Self {
        Self {
            host: host.to_string(),
            user,
            pass,
        }
    }
}

#[cfg(feature = "mail")]
#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        use lettre::{
            message::{Message, MultiPart},
            transport::smtp::authentication::Credentials,
            SmtpTransport as LettreSmtp, Transport,
        };

        let mut builder = Message::builder()
            .from(email.from.parse().map_err(|e| anyhow!("Invalid from address: {e}"))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {e}"))?)
            .subject(email.subject.clone());
        if let Some(reply_to) = &email.reply_to {
            builder = builder
                .reply_to(reply_to.parse().map_err(|e| anyhow!("Invalid reply-to address: {e}"))?);
        }
        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .context("Failed to build email")?;

        let mailer = match (&self.user, &self.pass) {
            (Some(user), Some(pass)) => LettreSmtp::relay(&self.host)
                .context("SMTP relay error")?
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            _ => LettreSmtp::builder_dangerous(&self.host).build(),
        };

        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .context("SMTP task failed")?
            .context("Failed to send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Logs instead of sending.
pub struct DisabledTransport;

#[async_trait]
impl EmailTransport for DisabledTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(
            "Email delivery disabled, skipping '{}' to {}",
            email.subject, email.to
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub fn transport_from_config(config: &EmailConfig) -> Result<Arc<dyn EmailTransport>> {
    match config.provider {
        EmailProvider::Api => {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow!("EMAIL_API_KEY is required for the email API"))?;
            Ok(Arc::new(ApiTransport::new(&config.api_url, key)?))
        }
        #[cfg(feature = "mail")]
        EmailProvider::Smtp => Ok(Arc::new(SmtpTransport::new(
            &config.smtp_host,
            config.smtp_user.clone(),
            config.smtp_pass.clone(),
        ))),
        #[cfg(not(feature = "mail"))]
        EmailProvider::Smtp => {
            log::warn!("EMAIL_PROVIDER=smtp but the mail feature is disabled, emails will not be sent");
            Ok(Arc::new(DisabledTransport))
        }
        EmailProvider::Disabled => Ok(Arc::new(DisabledTransport)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "bookings@example.com".to_string(),
            to: "ana@example.com".to_string(),
            reply_to: Some("salon@example.com".to_string()),
            subject: "Booking confirmed".to_string(),
            html: "<p>hi</p>".to_string(),
            text: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_api_transport_posts_email() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer re_test")
            .match_body(Matcher::PartialJson(json!({
                "from": "bookings@example.com",
                "to": ["ana@example.com"],
                "subject": "Booking confirmed",
                "reply_to": "salon@example.com",
            })))
            .with_status(200)
            .with_body(r#"{"id":"email_1"}"#)
            .create_async()
            .await;

        let transport = ApiTransport::new(&server.url(), "re_test").unwrap();
        transport.send(&email()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_transport_surfaces_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/emails")
            .with_status(422)
            .with_body(r#"{"message":"invalid to"}"#)
            .create_async()
            .await;

        let transport = ApiTransport::new(&server.url(), "re_test").unwrap();
        let err = transport.send(&email()).await.unwrap_err();
        assert!(err.to_string().contains("422"));
    }

    #[tokio::test]
    async fn test_disabled_transport_accepts_everything() {
        assert!(DisabledTransport.send(&email()).await.is_ok());
        assert_eq!(DisabledTransport.name(), "disabled");
    }
}
