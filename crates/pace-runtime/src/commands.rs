//! Text command surface offered to the chat host.
//!
//! The host hands over a raw message line and the id of the conversation it
//! came from; every command produces exactly one reply.

use std::sync::Arc;

use async_trait::async_trait;
use pace_core::PaceError;
use pace_data::paceman::PlayerDirectory;
use pace_data::registry::{SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome};
use tracing::info;

const SUBSCRIBE: &str = "/livepacesub";
const LIST: &str = "/livepacesublist";
const CHANGE_ROOM: &str = "/livepaceroom";
const UNSUBSCRIBE: &str = "/livepaceunsub";

const SUBSCRIBE_USAGE: &str = "Usage: /livepacesub <player> [room]";
const CHANGE_ROOM_USAGE: &str = "Usage: /livepaceroom <player> <room> (room 0 clears it)";
const UNSUBSCRIBE_USAGE: &str = "Usage: /livepaceunsub <player>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe { player: String, room: Option<String> },
    List,
    ChangeRoom { player: String, room: String },
    Unsubscribe { player: String },
    /// A known command with the wrong arguments.
    Usage(&'static str),
}

impl Command {
    /// Parse a message line. `None` when the line is not one of our commands.
    pub fn parse(line: &str) -> Option<Command> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        let args: Vec<&str> = parts.collect();

        let command = match (name, args.as_slice()) {
            (SUBSCRIBE, [player]) => Command::Subscribe {
                player: player.to_string(),
                room: None,
            },
            (SUBSCRIBE, [player, room]) => Command::Subscribe {
                player: player.to_string(),
                room: Some(room.to_string()),
            },
            (SUBSCRIBE, _) => Command::Usage(SUBSCRIBE_USAGE),
            (LIST, _) => Command::List,
            (CHANGE_ROOM, [player, room]) => Command::ChangeRoom {
                player: player.to_string(),
                room: room.to_string(),
            },
            (CHANGE_ROOM, _) => Command::Usage(CHANGE_ROOM_USAGE),
            (UNSUBSCRIBE, [player]) => Command::Unsubscribe {
                player: player.to_string(),
            },
            (UNSUBSCRIBE, _) => Command::Usage(UNSUBSCRIBE_USAGE),
            _ => return None,
        };
        Some(command)
    }
}

/// Directory that accepts every name, for running without the remote check.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllPlayers;

#[async_trait]
impl PlayerDirectory for AcceptAllPlayers {
    async fn player_exists(&self, _player_name: &str) -> bool {
        true
    }
}

pub struct CommandHandler {
    registry: Arc<SubscriptionRegistry>,
    directory: Arc<dyn PlayerDirectory>,
}

impl CommandHandler {
    pub fn new(registry: Arc<SubscriptionRegistry>, directory: Arc<dyn PlayerDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Execute `command` on behalf of `origin` and return the reply text.
    pub async fn handle(&self, origin: &str, command: Command) -> String {
        match command {
            Command::Subscribe { player, room } => {
                self.subscribe(origin, &player, room.as_deref()).await
            }
            Command::List => self.list(origin),
            Command::ChangeRoom { player, room } => self.change_room(&player, &room),
            Command::Unsubscribe { player } => self.unsubscribe(origin, &player),
            Command::Usage(usage) => usage.to_string(),
        }
    }

    pub async fn subscribe(&self, origin: &str, player: &str, room: Option<&str>) -> String {
        if !self.directory.player_exists(player).await {
            return format!("Player {player} does not exist, please check the name.");
        }

        let outcome = self.registry.subscribe(player, origin, room);
        info!(player, origin, ?outcome, "subscription changed");

        let room = room.unwrap_or("none");
        match outcome {
            SubscribeOutcome::Created => format!("Subscribed to {player}, room {room}."),
            SubscribeOutcome::Updated => format!("Subscription to {player} updated, room {room}."),
        }
    }

    pub fn list(&self, origin: &str) -> String {
        let players = self.registry.list_subscriptions(origin);
        if players.is_empty() {
            "You have not subscribed to any players.".to_string()
        } else {
            format!("You are subscribed to: {}", players.join(", "))
        }
    }

    pub fn change_room(&self, player: &str, room: &str) -> String {
        match self.registry.change_room(player, room) {
            Ok(()) if room == pace_data::registry::CLEAR_ROOM_SENTINEL => {
                format!("Room for {player} cleared.")
            }
            Ok(()) => format!("Room for {player} set to {room}."),
            Err(PaceError::NotFound(_)) => format!("Player {player} is not subscribed."),
            Err(e) => format!("Could not change room for {player}: {e}"),
        }
    }

    pub fn unsubscribe(&self, origin: &str, player: &str) -> String {
        match self.registry.unsubscribe(player, origin) {
            Ok(UnsubscribeOutcome::Removed) | Ok(UnsubscribeOutcome::PlayerDropped) => {
                info!(player, origin, "unsubscribed");
                format!("Unsubscribed from {player}.")
            }
            Err(PaceError::NotFound(_)) => format!("You are not subscribed to {player}."),
            Err(e) => format!("Could not unsubscribe from {player}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pace_data::store::MemoryStore;

    struct KnownPlayers(Vec<&'static str>);

    #[async_trait]
    impl PlayerDirectory for KnownPlayers {
        async fn player_exists(&self, player_name: &str) -> bool {
            self.0.iter().any(|p| p.eq_ignore_ascii_case(player_name))
        }
    }

    fn handler(known: Vec<&'static str>) -> (CommandHandler, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::open(Arc::new(MemoryStore::new())));
        (
            CommandHandler::new(registry.clone(), Arc::new(KnownPlayers(known))),
            registry,
        )
    }

    // ── parse ─────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_subscribe() {
        assert_eq!(
            Command::parse("/livepacesub Foo"),
            Some(Command::Subscribe {
                player: "Foo".to_string(),
                room: None
            })
        );
        assert_eq!(
            Command::parse("  /livepacesub Foo 12  "),
            Some(Command::Subscribe {
                player: "Foo".to_string(),
                room: Some("12".to_string())
            })
        );
        assert_eq!(
            Command::parse("/livepacesub"),
            Some(Command::Usage(SUBSCRIBE_USAGE))
        );
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(Command::parse("/livepacesublist"), Some(Command::List));
        assert_eq!(
            Command::parse("/livepaceroom foo 0"),
            Some(Command::ChangeRoom {
                player: "foo".to_string(),
                room: "0".to_string()
            })
        );
        assert_eq!(
            Command::parse("/livepaceroom foo"),
            Some(Command::Usage(CHANGE_ROOM_USAGE))
        );
        assert_eq!(
            Command::parse("/livepaceunsub foo"),
            Some(Command::Unsubscribe {
                player: "foo".to_string()
            })
        );
    }

    #[test]
    fn test_parse_ignores_unrelated_lines() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("/livepacesubx Foo"), None);
    }

    // ── handle ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_subscribe_unknown_player_is_rejected() {
        let (h, registry) = handler(vec!["Foo"]);
        let reply = h.handle("g1", Command::parse("/livepacesub Ghost").unwrap()).await;
        assert_eq!(reply, "Player Ghost does not exist, please check the name.");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_then_list() {
        let (h, _registry) = handler(vec!["Foo", "Bar"]);

        let reply = h.subscribe("D", "Foo", Some("3")).await;
        assert_eq!(reply, "Subscribed to Foo, room 3.");
        let reply = h.subscribe("D", "Foo", None).await;
        assert_eq!(reply, "Subscription to Foo updated, room none.");
        h.subscribe("D", "Bar", None).await;

        assert_eq!(h.list("D"), "You are subscribed to: Bar, Foo");
        assert_eq!(h.list("E"), "You have not subscribed to any players.");
    }

    #[tokio::test]
    async fn test_change_room_replies() {
        let (h, registry) = handler(vec!["Foo"]);
        h.subscribe("D", "Foo", Some("3")).await;

        assert_eq!(h.change_room("foo", "7"), "Room for foo set to 7.");
        assert_eq!(registry.get("foo").unwrap().room_id.as_deref(), Some("7"));
        assert_eq!(h.change_room("foo", "0"), "Room for foo cleared.");
        assert!(registry.get("foo").unwrap().room_id.is_none());
        assert_eq!(h.change_room("unknown", "5"), "Player unknown is not subscribed.");
    }

    #[tokio::test]
    async fn test_unsubscribe_replies() {
        let (h, registry) = handler(vec!["Foo"]);
        h.subscribe("D", "Foo", None).await;

        assert_eq!(
            h.handle("E", Command::parse("/livepaceunsub Foo").unwrap()).await,
            "You are not subscribed to Foo."
        );
        assert_eq!(
            h.handle("D", Command::parse("/livepaceunsub Foo").unwrap()).await,
            "Unsubscribed from Foo."
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_accept_all_players() {
        assert!(AcceptAllPlayers.player_exists("anyone").await);
    }
}
