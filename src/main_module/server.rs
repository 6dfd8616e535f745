//! HTTP server initialization and routing

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{routing::get, Router};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistants::configure_assistant_routes;
use crate::availability::configure_availability_routes;
use crate::bookings::configure_booking_routes;
use crate::business::configure_business_routes;
use crate::catalog::configure_catalog_routes;
use crate::core::middleware::require_admin_token;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::voice::{configure_voice_routes, BUSINESS_CONTEXT_HEADER, BUSINESS_CONTEXT_SIGNATURE_HEADER};

use super::{health_check, health_check_simple, shutdown_signal};

/// CORS for the dashboard. An empty origin list allows any origin.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(BUSINESS_CONTEXT_HEADER),
            HeaderName::from_static(BUSINESS_CONTEXT_SIGNATURE_HEADER),
        ]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{o}'");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Dashboard routes sit behind the admin token; voice and health routes do not.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let dashboard = Router::new()
        .merge(configure_business_routes())
        .merge(configure_catalog_routes())
        .merge(configure_availability_routes())
        .merge(configure_booking_routes())
        .merge(configure_assistant_routes())
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            require_admin_token,
        ));

    let cors = create_cors_layer(&app_state.config.security.cors_allowed_origins);

    Router::new()
        .route("/health", get(health_check_simple))
        .route(ApiUrls::HEALTH, get(health_check))
        .merge(configure_voice_routes())
        .merge(dashboard)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let host = app_state.config.server.host.clone();
    let port = app_state.config.server.port;
    let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| {
        error!("Invalid listen address {host}:{port}: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let app = create_router(app_state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let _ = create_cors_layer(&["https://app.wecallsmart.com".to_string()]);
        let _ = create_cors_layer(&[]);
        let _ = create_cors_layer(&["bad\norigin".to_string()]);
    }
}
