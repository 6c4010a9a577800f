//! paceman.gg HTTP client.
//!
//! Provides the live-run feed used by the poll loop and the player lookup
//! used when someone subscribes.

use std::time::Duration;

use async_trait::async_trait;
use pace_core::models::LiveRunSnapshot;
use pace_core::{PaceError, Result};
use serde_json::Value;
use tracing::debug;

const LIVE_RUNS_PATH: &str = "/api/ars/liveruns";
const SESSION_STATS_PATH: &str = "/stats/api/getSessionStats/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the current set of active runs.
#[async_trait]
pub trait LiveDataSource: Send + Sync {
    async fn fetch_live_runs(&self) -> Result<LiveRunSnapshot>;
}

/// Answers whether a player name is known to the tracker.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Any failure to find out counts as "does not exist".
    async fn player_exists(&self, player_name: &str) -> bool;
}

pub struct PacemanClient {
    client: reqwest::Client,
    base_url: String,
}

impl PacemanClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| PaceError::RemoteFetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PaceError::RemoteFetch(format!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                body
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| PaceError::RemoteFetch(e.to_string()))
    }
}

#[async_trait]
impl LiveDataSource for PacemanClient {
    async fn fetch_live_runs(&self) -> Result<LiveRunSnapshot> {
        let body = self.get_json(LIVE_RUNS_PATH, &[]).await?;
        let snapshot: LiveRunSnapshot =
            serde_json::from_value(body).map_err(|e| PaceError::RemoteFetch(e.to_string()))?;
        debug!(runs = snapshot.runs.len(), "fetched live runs");
        Ok(snapshot)
    }
}

#[async_trait]
impl PlayerDirectory for PacemanClient {
    async fn player_exists(&self, player_name: &str) -> bool {
        let query = [
            ("name", player_name),
            ("hours", "24"),
            ("hoursBetween", "24"),
        ];
        match self.get_json(SESSION_STATS_PATH, &query).await {
            Ok(body) => is_truthy(&body["nether"]),
            Err(e) => {
                debug!(player = player_name, error = %e, "player lookup failed");
                false
            }
        }
    }
}

/// Loose truthiness of a JSON value: null, false, zero and empty
/// strings/arrays/objects are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
