//! USSD API crate - axum HTTP surface for telecom gateways.
//!
//! Hosts the gateway protocol adapter (inbound field normalisation and
//! per-dialect response rendering), the USSD, delivery-callback and health
//! routes, the global rate limiter and the callback persistence worker.

pub mod callbacks;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
