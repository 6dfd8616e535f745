use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

use wecallsmart::assistants::{VapiClient, VoicePlatform};
use wecallsmart::core::config::AppConfig;
use wecallsmart::core::shared::state::AppState;
use wecallsmart::core::shared::utils::{create_conn, run_migrations};
use wecallsmart::email::{transport_from_config, DisabledTransport, EmailTransport, Notifier};
use wecallsmart::main_module::run_axum_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Starting wecallsmart {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let pool = create_conn(&config.database.url, config.database.max_connections)
        .context("Failed to create database pool")?;
    if config.database.run_migrations {
        let migration_pool = pool.clone();
        tokio::task::spawn_blocking(move || run_migrations(&migration_pool))
            .await
            .context("Migration task panicked")?
            .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
    }

    let voice_platform: Option<Arc<dyn VoicePlatform>> = match config.voice.api_key.as_deref() {
        Some(key) => {
            let client = VapiClient::with_timeout(
                &config.voice.api_base_url,
                key,
                config.voice.request_timeout_secs,
            )?;
            Some(Arc::new(client))
        }
        None => {
            warn!("VAPI_API_KEY not set, assistant publishing and phone provisioning are disabled");
            None
        }
    };
    if config.voice.webhook_secret.is_none() {
        warn!("VAPI_WEBHOOK_SECRET not set, webhook requests are not authenticated");
    }

    let transport: Arc<dyn EmailTransport> = match transport_from_config(&config.email) {
        Ok(t) => t,
        Err(e) => {
            error!("Email transport unavailable, notifications disabled: {e}");
            Arc::new(DisabledTransport)
        }
    };
    let notifier = Notifier::new(transport, config.email.from_address.clone());
    info!("Email notifications via {}", notifier.transport_name());

    let state = Arc::new(AppState {
        conn: pool,
        config: Arc::new(config),
        voice_platform,
        notifier: Arc::new(notifier),
    });

    run_axum_server(state).await?;
    info!("Server stopped");
    Ok(())
}
