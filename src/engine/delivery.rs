//! Background delivery of notifications.
//!
//! Webhook and chat sends run on spawned tasks so a slow endpoint never holds up
//! probing or ingestion. Deliveries for the same target are chained and go out in
//! the order their transitions were recorded.

use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Default)]
pub struct DeliveryQueue {
    tails: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DeliveryQueue {
    /// Runs `delivery` after every earlier delivery queued for `target_id`.
    pub async fn enqueue<F>(&self, target_id: &str, delivery: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tails = self.tails.lock().await;
        tails.retain(|_, handle| !handle.is_finished());
        let previous = tails.remove(target_id);
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    error!(error = %e, "Earlier notification task ended abnormally.");
                }
            }
            delivery.await;
        });
        tails.insert(target_id.to_string(), handle);
    }

    /// Waits for everything queued so far. Each send is already time bounded.
    pub async fn flush(&self) {
        let pending: Vec<_> = self.tails.lock().await.drain().map(|(_, h)| h).collect();
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "Waiting for pending notifications.");
        for handle in pending {
            if let Err(e) = handle.await {
                error!(error = %e, "Notification task ended abnormally.");
            }
        }
    }
}
