//! Router setup with the gateway routes and middleware.
//!
//! Gateway traffic goes through the global rate limiter; health and the
//! callback route do not. Every route shares tracing, CORS and a body
//! limit sized for USSD payloads.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ussd_core::config::UssdConfig;
use ussd_core::error::UssdError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Gateway bodies are a handful of short fields.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Gateways call server-to-server; CORS only matters for test consoles.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let limiter = RateLimiter::new(state.config.limits.requests_per_sec);

    let gateway_routes = Router::new()
        .route("/ussd", post(handlers::ussd))
        .route("/ussd/{dialect}", post(handlers::ussd_dialect))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ussd/callback", post(handlers::callback));

    public_routes
        .merge(gateway_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured host and port.
pub async fn start_server(config: &UssdConfig, state: AppState) -> Result<(), UssdError> {
    let addr = format!("{}:{}", config.general.host, config.general.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| UssdError::Gateway(format!("Failed to bind {}: {}", addr, e)))?;
    info!(addr = %addr, "USSD gateway listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| UssdError::Gateway(format!("Server error: {}", e)))?;

    Ok(())
}
