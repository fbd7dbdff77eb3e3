//! Recent webhook history for operator inspection.
//!
//! A bounded ring buffer of the most recently received webhook bodies. It is
//! diagnostic only: concurrent deliveries may interleave, and everything is
//! lost on restart.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One received webhook, as captured before processing.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookSnapshot {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Body exactly as received (lossy UTF-8)
    pub raw: String,
    /// Body parsed as JSON, if it was JSON
    pub parsed: Option<Value>,
    pub signature_present: bool,
}

impl WebhookSnapshot {
    pub fn capture(id: Uuid, received_at: DateTime<Utc>, raw: &[u8], signature_present: bool) -> Self {
        Self {
            id,
            received_at,
            raw: String::from_utf8_lossy(raw).into_owned(),
            parsed: serde_json::from_slice(raw).ok(),
            signature_present,
        }
    }
}

/// Shared, bounded history of received webhooks. Cloning shares the buffer.
#[derive(Clone)]
pub struct WebhookHistory {
    inner: Arc<RwLock<VecDeque<WebhookSnapshot>>>,
    capacity: usize,
}

impl WebhookHistory {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, snapshot: WebhookSnapshot) {
        let mut queue = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(snapshot);
    }

    /// The most recently recorded webhook.
    pub fn latest(&self) -> Option<WebhookSnapshot> {
        let queue = self.inner.read().unwrap_or_else(|e| e.into_inner());
        queue.back().cloned()
    }

    /// All retained webhooks, newest first.
    pub fn recent(&self) -> Vec<WebhookSnapshot> {
        let queue = self.inner.read().unwrap_or_else(|e| e.into_inner());
        queue.iter().rev().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
