//! Delivery-callback persistence worker.
//!
//! The callback route only enqueues; this worker drains the bounded queue
//! and writes each notice on the blocking pool, so a slow disk never
//! holds up a USSD request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ussd_core::types::DeliveryNotice;
use ussd_storage::{CallbackRepository, Database};

/// Start the worker. Returns the queue sender and the worker handle; the
/// worker exits once every sender is dropped and the queue is drained.
pub fn spawn_callback_worker(
    database: Arc<Database>,
    capacity: usize,
) -> (mpsc::Sender<DeliveryNotice>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<DeliveryNotice>(capacity.max(1));
    let repo = Arc::new(CallbackRepository::new(database));

    let handle = tokio::spawn(async move {
        info!(capacity, "Callback worker started");
        while let Some(notice) = rx.recv().await {
            let repo = Arc::clone(&repo);
            let session_id = notice.session_id.clone();
            match tokio::task::spawn_blocking(move || repo.save(&notice)).await {
                Ok(Ok(())) => debug!(session_id = %session_id, "Delivery notice stored"),
                Ok(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "Failed to store delivery notice")
                }
                Err(e) => warn!(error = %e, "Callback store task panicked"),
            }
        }
        info!("Callback worker stopped");
    });

    (tx, handle)
}
