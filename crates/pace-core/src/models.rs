use serde::{Deserialize, Serialize};

/// Lowercase registry key for a player name.
pub fn player_key(player_name: &str) -> String {
    player_name.to_lowercase()
}

/// The `(world, event)` pair of the last notification dispatched for a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastNotified {
    /// Opaque identifier of the run/world.
    pub world_id: String,
    /// Raw event id as reported by the API (e.g. `"rsg.enter_end"`).
    pub event_id: String,
}

impl LastNotified {
    pub fn new(world_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            world_id: world_id.into(),
            event_id: event_id.into(),
        }
    }

    /// `true` when this is exactly the `(world_id, event_id)` pair given.
    pub fn matches(&self, world_id: &str, event_id: &str) -> bool {
        self.world_id == world_id && self.event_id == event_id
    }
}

/// One tracked player and everyone subscribed to them.
///
/// Serialized through [`PlayerRecord`] so that the on-disk document keeps its
/// flat `last_world_id` / `last_event` columns while the in-memory form can
/// only hold both halves or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlayerRecord", into = "PlayerRecord")]
pub struct PlayerSubscription {
    /// Display-cased name as last supplied by a subscriber.
    pub canonical_name: String,
    /// Destination ids in delivery order, without duplicates.
    pub subscribers: Vec<String>,
    /// Free-form room annotation.
    pub room_id: Option<String>,
    /// Last notification dispatched for this player.
    pub last_notified: Option<LastNotified>,
}

impl PlayerSubscription {
    /// A fresh subscription with a single subscriber.
    pub fn new(canonical_name: &str, destination_id: &str, room_id: Option<String>) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            subscribers: vec![destination_id.to_string()],
            room_id,
            last_notified: None,
        }
    }

    /// Registry key for this entry.
    pub fn key(&self) -> String {
        player_key(&self.canonical_name)
    }

    pub fn has_subscriber(&self, destination_id: &str) -> bool {
        self.subscribers.iter().any(|s| s == destination_id)
    }

    /// Append `destination_id` unless already present. Returns `true` when added.
    pub fn add_subscriber(&mut self, destination_id: &str) -> bool {
        if self.has_subscriber(destination_id) {
            return false;
        }
        self.subscribers.push(destination_id.to_string());
        true
    }

    /// Remove `destination_id`. Returns `true` when it was present.
    pub fn remove_subscriber(&mut self, destination_id: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s != destination_id);
        self.subscribers.len() != before
    }
}

/// Wire shape of a [`PlayerSubscription`] inside the persistence document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(default)]
    pub subscriber_id: Vec<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    pub player_name: String,
    #[serde(default)]
    pub last_world_id: Option<String>,
    #[serde(default)]
    pub last_event: Option<String>,
}

impl From<PlayerRecord> for PlayerSubscription {
    fn from(record: PlayerRecord) -> Self {
        let mut subscribers: Vec<String> = Vec::with_capacity(record.subscriber_id.len());
        for id in record.subscriber_id {
            if !subscribers.contains(&id) {
                subscribers.push(id);
            }
        }

        // A half-written pair is treated as "never notified".
        let last_notified = match (record.last_world_id, record.last_event) {
            (Some(world_id), Some(event_id)) => Some(LastNotified { world_id, event_id }),
            _ => None,
        };

        Self {
            canonical_name: record.player_name,
            subscribers,
            room_id: record.room_id,
            last_notified,
        }
    }
}

impl From<PlayerSubscription> for PlayerRecord {
    fn from(sub: PlayerSubscription) -> Self {
        let (last_world_id, last_event) = match sub.last_notified {
            Some(last) => (Some(last.world_id), Some(last.event_id)),
            None => (None, None),
        };
        Self {
            subscriber_id: sub.subscribers,
            room_id: sub.room_id,
            player_name: sub.canonical_name,
            last_world_id,
            last_event,
        }
    }
}

// ── Live data ─────────────────────────────────────────────────────────────────

/// One split reported by paceman.gg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Namespaced event id, e.g. `"rsg.first_portal"`.
    pub event_id: String,
    /// Real time elapsed, milliseconds.
    pub rta: u64,
    /// In-game time, milliseconds.
    pub igt: u64,
}

/// A run currently in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRun {
    pub nickname: String,
    pub game_version: String,
    pub world_id: String,
    #[serde(default)]
    pub event_list: Vec<ProgressEvent>,
}

impl LiveRun {
    /// Most recent event of the run, if it has reached any split yet.
    pub fn latest_event(&self) -> Option<&ProgressEvent> {
        self.event_list.last()
    }
}

/// Everything `liveruns` returned in one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveRunSnapshot {
    pub runs: Vec<LiveRun>,
}

impl LiveRunSnapshot {
    pub fn new(runs: Vec<LiveRun>) -> Self {
        Self { runs }
    }

    /// Lowercase nickname → run. Later duplicates win.
    pub fn by_player(&self) -> std::collections::HashMap<String, &LiveRun> {
        self.runs
            .iter()
            .map(|run| (player_key(&run.nickname), run))
            .collect()
    }
}
