use anyhow::{anyhow, Context};
use log::warn;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub voice: VoiceConfig,
    pub email: EmailConfig,
    pub security: SecurityConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL the voice platform uses to reach the webhook.
    pub public_base_url: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailProvider {
    Api,
    Smtp,
    Disabled,
}

impl std::str::FromStr for EmailProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" | "resend" | "http" => Ok(Self::Api),
            "smtp" => Ok(Self::Smtp),
            "disabled" | "none" | "off" | "" => Ok(Self::Disabled),
            other => Err(anyhow!("Unknown EMAIL_PROVIDER '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    pub from_address: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub smtp_host: String,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Bearer token guarding the dashboard API.
    pub admin_api_token: Option<String>,
    /// Serve the dashboard without a token. Only honoured when no token is set.
    pub allow_open_dashboard: bool,
    /// HMAC key for the `X-Business-Context` header. `None` accepts unsigned headers.
    pub context_signing_secret: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&get)
                .context("DATABASE_URL (or TABLES_* variables) must be set")?,
        };

        let port = match get("SERVER_PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("Invalid SERVER_PORT '{p}'"))?,
            None => 8080,
        };

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let email_provider: EmailProvider = get_or("EMAIL_PROVIDER", "disabled").parse()?;
        let email = EmailConfig {
            provider: email_provider,
            from_address: get_or("EMAIL_FROM", "bookings@wecallsmart.com"),
            api_url: get_or("EMAIL_API_URL", "https://api.resend.com")
                .trim_end_matches('/')
                .to_string(),
            api_key: get("EMAIL_API_KEY"),
            smtp_host: get_or("SMTP_HOST", "localhost"),
            smtp_user: get("SMTP_USER"),
            smtp_pass: get("SMTP_PASS"),
        };
        if email.provider == EmailProvider::Api && email.api_key.is_none() {
            return Err(anyhow!("EMAIL_PROVIDER=api requires EMAIL_API_KEY"));
        }

        let voice = VoiceConfig {
            api_base_url: get_or("VAPI_BASE_URL", "https://api.vapi.ai")
                .trim_end_matches('/')
                .to_string(),
            api_key: get("VAPI_API_KEY"),
            webhook_secret: get("VAPI_WEBHOOK_SECRET"),
            request_timeout_secs: get("VAPI_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        };
        if voice.api_key.is_none() {
            warn!("VAPI_API_KEY not set, assistant and phone number management is unavailable");
        }

        let security = SecurityConfig {
            admin_api_token: get("ADMIN_API_TOKEN"),
            allow_open_dashboard: get("ALLOW_OPEN_DASHBOARD")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            context_signing_secret: get("CONTEXT_SIGNING_SECRET"),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        if security.admin_api_token.is_none() {
            if !security.allow_open_dashboard {
                return Err(anyhow!(
                    "ADMIN_API_TOKEN must be set (or ALLOW_OPEN_DASHBOARD=true for local development)"
                ));
            }
            warn!("ADMIN_API_TOKEN not set and ALLOW_OPEN_DASHBOARD=true, dashboard API is unauthenticated");
        }

        Ok(Self {
            server: ServerConfig {
                host: get_or("SERVER_HOST", "0.0.0.0"),
                port,
                public_base_url,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get("DATABASE_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                run_migrations: get("RUN_MIGRATIONS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
            },
            voice,
            email,
            security,
        })
    }

    pub fn webhook_url(&self) -> String {
        format!("{}/api/vapi/webhook", self.server.public_base_url)
    }
}

fn database_url_from_parts<F>(get: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let username = get("TABLES_USERNAME")?;
    let password = get("TABLES_PASSWORD").unwrap_or_default();
    let server = get("TABLES_SERVER").unwrap_or_else(|| "localhost".to_string());
    let port = get("TABLES_PORT")
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(5432);
    let database = get("TABLES_DATABASE").unwrap_or_else(|| "wecallsmart".to_string());
    Some(format!(
        "postgres://{username}:{password}@{server}:{port}/{database}"
    ))
}
