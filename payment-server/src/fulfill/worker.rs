//! Background fulfillment worker.
//!
//! The webhook handler only enqueues; this worker drains the queue and spawns
//! one task per event. Outcomes, errors and panics of those tasks are visible
//! only in the logs.

use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};
use uuid::Uuid;

use super::Fulfiller;

/// A webhook accepted by the HTTP layer and waiting for processing.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Request body exactly as received
    pub raw: Bytes,
    pub signature: Option<String>,
}

impl InboundEvent {
    pub fn new(raw: Bytes, signature: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            raw,
            signature,
        }
    }
}

/// Sending half of the fulfillment queue.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<InboundEvent>,
}

impl EventQueue {
    /// Create a bounded queue and its receiving half.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. Fails when the queue is full or the worker is gone.
    pub fn enqueue(&self, event: InboundEvent) -> Result<(), TrySendError<InboundEvent>> {
        self.tx.try_send(event)
    }
}

/// Spawn the worker loop. It stops once every [`EventQueue`] handle is dropped
/// and in-flight events have finished.
pub fn spawn_worker(
    fulfiller: Arc<Fulfiller>,
    mut rx: mpsc::Receiver<InboundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("fulfillment_worker_started");

        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(event) = received else { break };
                    let fulfiller = fulfiller.clone();
                    tasks.spawn(async move {
                        let event_id = event.id;
                        let queued_ms = (Utc::now() - event.received_at).num_milliseconds();
                        let disposition = fulfiller.process_event(event).await;
                        info!(
                            event_id = %event_id,
                            queued_ms = queued_ms,
                            disposition = disposition.as_str(),
                            "webhook_processed"
                        );
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "webhook_task_failed");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "webhook_task_failed");
            }
        }

        info!("fulfillment_worker_stopped");
    })
}
