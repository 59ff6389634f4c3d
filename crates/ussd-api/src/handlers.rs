//! Route handlers for the gateway, callback and health endpoints.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use ussd_core::types::{mask_phone, DeliveryNotice, Dialect};
use ussd_storage::MemberRepository;

use crate::error::ApiError;
use crate::gateway::{self, Inbound};
use crate::state::AppState;

// =============================================================================
// Gateway
// =============================================================================

/// POST /ussd - gateway request in the configured dialect.
pub async fn ussd(State(state): State<AppState>, Inbound(fields): Inbound) -> Result<Response, ApiError> {
    let dialect = state.config.gateway.dialect;
    answer(&state, dialect, fields).await
}

/// POST /ussd/{dialect} - gateway request with the dialect forced by path.
pub async fn ussd_dialect(
    State(state): State<AppState>,
    Path(dialect): Path<String>,
    Inbound(fields): Inbound,
) -> Result<Response, ApiError> {
    let dialect = Dialect::from_str(&dialect).map_err(ApiError::NotFound)?;
    answer(&state, dialect, fields).await
}

async fn answer(
    state: &AppState,
    dialect: Dialect,
    fields: gateway::InboundFields,
) -> Result<Response, ApiError> {
    let request = gateway::normalize(fields, &state.config.gateway)?;
    debug!(
        session_id = %request.session_id,
        phone = %mask_phone(&request.phone_number),
        %dialect,
        "Gateway request"
    );

    let response = state.orchestrator.handle(&request).await;

    Ok(gateway::render(
        &response,
        dialect,
        state.config.gateway.max_response_chars,
    ))
}

// =============================================================================
// Delivery callbacks
// =============================================================================

/// Request body for POST /ussd/callback.
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub status: String,
    pub session_id: String,
    pub message: Option<String>,
    pub member_id: Option<String>,
}

/// Acknowledgement for POST /ussd/callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackAck {
    pub accepted: bool,
    pub session_id: String,
}

/// POST /ussd/callback - queue a delivery-status notice and return 202.
pub async fn callback(
    State(state): State<AppState>,
    Json(body): Json<CallbackRequest>,
) -> Result<(StatusCode, Json<CallbackAck>), ApiError> {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".to_string()));
    }

    let notice = DeliveryNotice {
        status: body.status,
        session_id: body.session_id.clone(),
        message: body.message,
        member_id: body.member_id,
        received_at: Utc::now(),
    };

    match state.callbacks.try_send(notice) {
        Ok(()) => {
            info!(session_id = %body.session_id, "Delivery notice queued");
            Ok((
                StatusCode::ACCEPTED,
                Json(CallbackAck {
                    accepted: true,
                    session_id: body.session_id,
                }),
            ))
        }
        Err(TrySendError::Full(_)) => {
            warn!(session_id = %body.session_id, "Callback queue full");
            Err(ApiError::ServiceUnavailable("callback queue is full".to_string()))
        }
        Err(TrySendError::Closed(_)) => Err(ApiError::ServiceUnavailable(
            "callback worker is not running".to_string(),
        )),
    }
}

// =============================================================================
// Health
// =============================================================================

/// Response for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub dialect: Dialect,
    pub members: u64,
}

/// GET /health - liveness plus a member count from storage.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let members = MemberRepository::new(state.database.clone()).count();
    let (status, members) = match members {
        Ok(n) => ("healthy", n),
        Err(e) => {
            warn!(error = %e, "Health check could not read members");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        dialect: state.config.gateway.dialect,
        members,
    })
}
