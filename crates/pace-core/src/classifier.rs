//! Decides whether a player's latest split is worth a notification.
//!
//! The decision depends only on the last notification dispatched for the
//! player and the newest event of their live run, so everything here is pure.

use crate::formatting::format_split;
use crate::models::{LastNotified, LiveRun, PlayerSubscription, ProgressEvent};

/// Game version whose splits are filtered by in-game-time ceilings.
pub const LEGACY_GATED_VERSION: &str = "1.16.1";

/// Namespace prefix paceman.gg puts in front of every event id.
const EVENT_NAMESPACE: &str = "rsg.";

// ── Event kinds ───────────────────────────────────────────────────────────────

/// Progress events that can trigger a notification, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FirstPortal,
    EnterStronghold,
    EnterEnd,
    Credits,
}

struct KindSpec {
    kind: EventKind,
    id: &'static str,
    label: &'static str,
    legacy_igt_ceiling: Option<u64>,
}

/// Single source of truth for ids, labels and 1.16.1 ceilings (inclusive, ms).
/// Indexed by `EventKind as usize`.
const KINDS: [KindSpec; 4] = [
    KindSpec {
        kind: EventKind::FirstPortal,
        id: "first_portal",
        label: "Blind travel",
        legacy_igt_ceiling: Some(480_000),
    },
    KindSpec {
        kind: EventKind::EnterStronghold,
        id: "enter_stronghold",
        label: "Entered stronghold",
        legacy_igt_ceiling: Some(660_000),
    },
    KindSpec {
        kind: EventKind::EnterEnd,
        id: "enter_end",
        label: "Entered the End",
        legacy_igt_ceiling: Some(780_000),
    },
    KindSpec {
        kind: EventKind::Credits,
        id: "credits",
        label: "Run complete",
        legacy_igt_ceiling: None,
    },
];

impl EventKind {
    /// All recognised kinds in canonical order.
    pub const ALL: [EventKind; 4] = [
        EventKind::FirstPortal,
        EventKind::EnterStronghold,
        EventKind::EnterEnd,
        EventKind::Credits,
    ];

    fn spec(self) -> &'static KindSpec {
        &KINDS[self as usize]
    }

    /// Parse a raw event id. Accepts both `rsg.enter_end` and `enter_end`.
    pub fn from_event_id(raw: &str) -> Option<Self> {
        let bare = raw.strip_prefix(EVENT_NAMESPACE).unwrap_or(raw);
        KINDS.iter().find(|spec| spec.id == bare).map(|spec| spec.kind)
    }

    /// Bare id without namespace.
    pub fn id(self) -> &'static str {
        self.spec().id
    }

    /// Human-readable label used in messages.
    pub fn label(self) -> &'static str {
        self.spec().label
    }

    /// In-game-time ceiling applied on [`LEGACY_GATED_VERSION`], if any.
    pub fn legacy_igt_ceiling(self) -> Option<u64> {
        self.spec().legacy_igt_ceiling
    }

    /// `true` when an event of this kind at `igt_millis` passes the timing
    /// gate for `game_version`.
    pub fn within_pace(self, igt_millis: u64, game_version: &str) -> bool {
        if game_version != LEGACY_GATED_VERSION {
            return true;
        }
        match self.legacy_igt_ceiling() {
            Some(ceiling) => igt_millis <= ceiling,
            None => true,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Decision ──────────────────────────────────────────────────────────────────

/// Outcome of classifying a player's latest event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDecision {
    Suppressed,
    Notify {
        /// Rendered text to send to every subscriber.
        message: String,
        /// State to record once delivery has been attempted.
        world_id: String,
        event_id: String,
    },
}

impl NotificationDecision {
    pub fn is_notify(&self) -> bool {
        matches!(self, NotificationDecision::Notify { .. })
    }
}

/// Return `true` when the observed event should be announced.
///
/// Suppresses an exact repeat of the last notification, any unrecognised
/// event kind, and on 1.16.1 any split slower than its ceiling.
pub fn should_notify(
    last: Option<&LastNotified>,
    new_world_id: &str,
    new_event_id: &str,
    igt_millis: u64,
    game_version: &str,
) -> bool {
    if last.is_some_and(|l| l.matches(new_world_id, new_event_id)) {
        return false;
    }

    match EventKind::from_event_id(new_event_id) {
        Some(kind) => kind.within_pace(igt_millis, game_version),
        None => false,
    }
}

/// Render the fixed notification template.
pub fn render_message(
    player_name: &str,
    game_version: &str,
    kind: EventKind,
    event: &ProgressEvent,
) -> String {
    format!(
        "{} live pace:\nVersion: {}\nTime: {}\nEvent: {}",
        player_name,
        game_version,
        format_split(event.rta, event.igt),
        kind.label()
    )
}

/// Classify the newest event of `run` against what `subscription` last saw.
pub fn classify(subscription: &PlayerSubscription, run: &LiveRun) -> NotificationDecision {
    let Some(event) = run.latest_event() else {
        return NotificationDecision::Suppressed;
    };

    if !should_notify(
        subscription.last_notified.as_ref(),
        &run.world_id,
        &event.event_id,
        event.igt,
        &run.game_version,
    ) {
        return NotificationDecision::Suppressed;
    }

    // should_notify already rejected unknown kinds.
    let Some(kind) = EventKind::from_event_id(&event.event_id) else {
        return NotificationDecision::Suppressed;
    };

    NotificationDecision::Notify {
        message: render_message(
            &subscription.canonical_name,
            &run.game_version,
            kind,
            event,
        ),
        world_id: run.world_id.clone(),
        event_id: event.event_id.clone(),
    }
}
