//! Application state shared across all route handlers.
//!
//! AppState holds the orchestrator, the database used for health and
//! callback bookkeeping, and the sending half of the callback queue.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use ussd_core::config::UssdConfig;
use ussd_core::types::DeliveryNotice;
use ussd_engine::Orchestrator;
use ussd_storage::Database;

/// Shared application state.
///
/// All fields use `Arc` (or are cheaply clonable) so every handler task
/// gets its own handle. Nothing here carries per-session navigation state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration the orchestrator was built with.
    pub config: Arc<UssdConfig>,
    /// Flow orchestrator answering gateway requests.
    pub orchestrator: Arc<Orchestrator>,
    /// SQLite database for member counts.
    pub database: Arc<Database>,
    /// Queue feeding the delivery-callback worker.
    pub callbacks: mpsc::Sender<DeliveryNotice>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState around an orchestrator and a callback queue.
    pub fn new(
        orchestrator: Orchestrator,
        database: Arc<Database>,
        callbacks: mpsc::Sender<DeliveryNotice>,
    ) -> Self {
        Self {
            config: Arc::new(orchestrator.config().clone()),
            orchestrator: Arc::new(orchestrator),
            database,
            callbacks,
            start_time: Instant::now(),
        }
    }
}
