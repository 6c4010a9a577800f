//! Fan-out of one message to every subscriber of a player.
//!
//! Sends go out one at a time with a fixed pause between them so the chat
//! transport's outbound rate limit is respected. A failed send is logged and
//! the remaining subscribers are still attempted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pace_core::Result;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Default pause between two sends for the same player.
pub const DEFAULT_SEND_PAUSE: Duration = Duration::from_millis(1000);

/// Outbound message transport provided by the host.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver `text` to `destination_id`. Fails with `PaceError::Delivery`.
    async fn deliver(&self, destination_id: &str, text: &str) -> Result<()>;
}

/// Outcome of one [`Notifier::broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    clock: Arc<dyn Clock>,
    pause: Duration,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, clock: Arc<dyn Clock>, pause: Duration) -> Self {
        Self { sink, clock, pause }
    }

    /// Send `message` to each subscriber in order.
    pub async fn broadcast(&self, subscribers: &[String], message: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (i, destination) in subscribers.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                self.clock.sleep(self.pause).await;
            }

            match self.sink.deliver(destination, message).await {
                Ok(()) => {
                    debug!(destination = %destination, "notification delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(destination = %destination, error = %e, "notification delivery failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
