//! [`MessageSink`] implementations.

#[cfg(test)]
use std::collections::HashSet;
use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use pace_core::{PaceError, Result};
#[cfg(test)]
use parking_lot::Mutex;
use serde_json::json;
use tracing::warn;

use crate::notifier::MessageSink;

/// Upper bound on one webhook request, connect through response.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Prints each message to stdout, prefixed with its destination.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn deliver(&self, destination_id: &str, text: &str) -> Result<()> {
        let mut out = std::io::stdout();
        writeln!(out, "[{}]\n{}\n", destination_id, text)
            .and_then(|_| out.flush())
            .map_err(|e| PaceError::delivery(destination_id, e))
    }
}

/// POSTs `{"destination": .., "text": ..}` to a webhook.
pub struct WebhookSink {
    url: String,
    http: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self::with_timeout(url, DELIVERY_TIMEOUT)
    }

    /// A sink whose requests fail with a delivery error after `timeout`.
    pub fn with_timeout(url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { url, http }
    }
}

#[async_trait]
impl MessageSink for WebhookSink {
    async fn deliver(&self, destination_id: &str, text: &str) -> Result<()> {
        let payload = json!({
            "destination": destination_id,
            "text": text,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PaceError::delivery(destination_id, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "webhook returned non-success");
            return Err(PaceError::delivery(
                destination_id,
                format!("webhook returned {status}"),
            ));
        }

        Ok(())
    }
}

/// Keeps delivered messages in memory; destinations can be made to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent delivery to `destination_id` fails.
    pub fn fail_for(&self, destination_id: &str) {
        self.failing.lock().insert(destination_id.to_string());
    }

    /// `(destination, text)` pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MessageSink for MemorySink {
    async fn deliver(&self, destination_id: &str, text: &str) -> Result<()> {
        if self.failing.lock().contains(destination_id) {
            return Err(PaceError::delivery(destination_id, "destination unavailable"));
        }
        self.sent
            .lock()
            .push((destination_id.to_string(), text.to_string()));
        Ok(())
    }
}
