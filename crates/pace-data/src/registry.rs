//! Authoritative in-memory registry of tracked players.
//!
//! Every mutation takes the registry lock, changes the map and writes the
//! whole map through the [`SubscriptionStore`] before releasing the lock, so
//! command handlers and the poll loop can interleave freely. Save failures are
//! logged and the in-memory state stays authoritative until the next save.

use std::collections::BTreeMap;
use std::sync::Arc;

use pace_core::models::{player_key, LastNotified, PlayerSubscription};
use pace_core::{PaceError, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::store::{RegistryDocument, SubscriptionStore};

/// Room value that clears the room annotation in [`SubscriptionRegistry::change_room`].
pub const CLEAR_ROOM_SENTINEL: &str = "0";

/// Result of [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The player was not tracked before.
    Created,
    /// The player was already tracked; name and room were refreshed.
    Updated,
}

/// Result of [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// The destination was removed; others remain subscribed.
    Removed,
    /// The destination was the last subscriber and the player was dropped.
    PlayerDropped,
}

pub struct SubscriptionRegistry {
    players: Mutex<RegistryDocument>,
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionRegistry {
    /// Load the registry from `store`.
    ///
    /// A missing or unreadable document starts an empty registry; the failure
    /// is logged, never returned. Loaded entries are re-keyed by lowercase
    /// name and entries without subscribers are dropped.
    pub fn open(store: Arc<dyn SubscriptionStore>) -> Self {
        let players = match store.load() {
            Ok(Some(document)) => normalise(document),
            Ok(None) => {
                debug!("no subscription document yet; starting empty");
                RegistryDocument::new()
            }
            Err(e) => {
                warn!(error = %e, "failed to load subscriptions; starting empty");
                RegistryDocument::new()
            }
        };

        debug!(players = players.len(), "subscription registry opened");
        Self {
            players: Mutex::new(players),
            store,
        }
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    /// Subscribe `destination_id` to `player_name`.
    ///
    /// On an existing entry the destination is added only if missing, while
    /// `room_id` and the display name are overwritten unconditionally.
    pub fn subscribe(
        &self,
        player_name: &str,
        destination_id: &str,
        room_id: Option<&str>,
    ) -> SubscribeOutcome {
        let key = player_key(player_name);
        let mut players = self.players.lock();

        let outcome = match players.get_mut(&key) {
            Some(entry) => {
                entry.add_subscriber(destination_id);
                entry.room_id = room_id.map(str::to_string);
                entry.canonical_name = player_name.to_string();
                SubscribeOutcome::Updated
            }
            None => {
                players.insert(
                    key,
                    PlayerSubscription::new(
                        player_name,
                        destination_id,
                        room_id.map(str::to_string),
                    ),
                );
                SubscribeOutcome::Created
            }
        };

        self.persist(&players);
        outcome
    }

    /// Remove `destination_id` from `player_name`'s subscribers, dropping the
    /// player once nobody is left.
    pub fn unsubscribe(&self, player_name: &str, destination_id: &str) -> Result<UnsubscribeOutcome> {
        let key = player_key(player_name);
        let mut players = self.players.lock();

        let entry = players
            .get_mut(&key)
            .ok_or_else(|| PaceError::NotFound(format!("player {player_name}")))?;

        if !entry.remove_subscriber(destination_id) {
            return Err(PaceError::NotFound(format!(
                "subscription of {destination_id} to {player_name}"
            )));
        }

        let outcome = if entry.subscribers.is_empty() {
            players.remove(&key);
            UnsubscribeOutcome::PlayerDropped
        } else {
            UnsubscribeOutcome::Removed
        };

        self.persist(&players);
        Ok(outcome)
    }

    /// Set the room annotation. [`CLEAR_ROOM_SENTINEL`] clears it.
    pub fn change_room(&self, player_name: &str, room_id: &str) -> Result<()> {
        let key = player_key(player_name);
        let mut players = self.players.lock();

        let entry = players
            .get_mut(&key)
            .ok_or_else(|| PaceError::NotFound(format!("player {player_name}")))?;

        entry.room_id = if room_id == CLEAR_ROOM_SENTINEL {
            None
        } else {
            Some(room_id.to_string())
        };

        self.persist(&players);
        Ok(())
    }

    /// Remember that `(world_id, event_id)` has been announced for `player_name`.
    pub fn record_notification(&self, player_name: &str, world_id: &str, event_id: &str) -> Result<()> {
        let key = player_key(player_name);
        let mut players = self.players.lock();

        let entry = players
            .get_mut(&key)
            .ok_or_else(|| PaceError::NotFound(format!("player {player_name}")))?;
        entry.last_notified = Some(LastNotified::new(world_id, event_id));

        self.persist(&players);
        Ok(())
    }

    /// Write the current state through the store, returning any failure.
    pub fn flush(&self) -> Result<()> {
        let players = self.players.lock();
        self.store.save(&players)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Display names of every player `destination_id` is subscribed to,
    /// ordered by registry key.
    pub fn list_subscriptions(&self, destination_id: &str) -> Vec<String> {
        let players = self.players.lock();
        let mut by_destination: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in players.values() {
            for subscriber in &entry.subscribers {
                by_destination
                    .entry(subscriber.as_str())
                    .or_default()
                    .push(entry.canonical_name.as_str());
            }
        }

        by_destination
            .remove(destination_id)
            .map(|names| names.into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Cloned view of every entry, for work that must not hold the lock.
    pub fn snapshot(&self) -> Vec<(String, PlayerSubscription)> {
        self.players
            .lock()
            .iter()
            .map(|(key, sub)| (key.clone(), sub.clone()))
            .collect()
    }

    pub fn get(&self, player_name: &str) -> Option<PlayerSubscription> {
        self.players.lock().get(&player_key(player_name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn persist(&self, players: &RegistryDocument) {
        if let Err(e) = self.store.save(players) {
            warn!(error = %e, "failed to save subscriptions; keeping in-memory state");
        }
    }
}

fn normalise(document: RegistryDocument) -> RegistryDocument {
    let mut players = RegistryDocument::new();
    for (stored_key, entry) in document {
        if entry.subscribers.is_empty() {
            debug!(player = %stored_key, "dropping entry without subscribers");
            continue;
        }
        let key = entry.key();
        if key != stored_key {
            debug!(stored = %stored_key, key = %key, "re-keying entry by display name");
        }
        match players.get_mut(&key) {
            Some(existing) => {
                warn!(
                    stored = %stored_key,
                    key = %key,
                    "duplicate entry for player; merging subscribers into the first one"
                );
                for destination in &entry.subscribers {
                    existing.add_subscriber(destination);
                }
            }
            None => {
                players.insert(key, entry);
            }
        }
    }
    players
}
