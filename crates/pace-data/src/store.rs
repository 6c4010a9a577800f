//! Persistence port for the subscription registry.
//!
//! The registry is always written as one whole document. [`JsonFileStore`]
//! keeps it on disk as pretty-printed JSON keyed by lowercase player name;
//! [`MemoryStore`] (tests and the `testing` feature only) keeps it in memory.

use std::collections::BTreeMap;
use std::path::PathBuf;
#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pace_core::models::PlayerSubscription;
use pace_core::{PaceError, Result};
use parking_lot::Mutex;

/// Full registry contents as persisted: lowercase player name → subscription.
pub type RegistryDocument = BTreeMap<String, PlayerSubscription>;

/// Durable home of the registry document.
pub trait SubscriptionStore: Send + Sync {
    /// Read the document. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<RegistryDocument>>;

    /// Replace the stored document with `document`.
    fn save(&self, document: &RegistryDocument) -> Result<()>;
}

// ── JsonFileStore ─────────────────────────────────────────────────────────────

/// Stores the registry as a JSON file, replacing it atomically on each save.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes load/save so the write path is never re-entered.
    io_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }
}

impl SubscriptionStore for JsonFileStore {
    fn load(&self) -> Result<Option<RegistryDocument>> {
        let _guard = self.io_lock.lock();

        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            PaceError::Persistence(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let document = serde_json::from_str::<RegistryDocument>(&content).map_err(|e| {
            PaceError::Persistence(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        Ok(Some(document))
    }

    fn save(&self, document: &RegistryDocument) -> Result<()> {
        let _guard = self.io_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PaceError::Persistence(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(document)?;

        // Write to a temp file then rename for atomicity.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                PaceError::Persistence(format!("failed to write {}: {}", self.path.display(), e))
            })?;

        Ok(())
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// In-memory store. Counts saves and can be told to fail them.
#[cfg(any(test, feature = "testing"))]
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Option<RegistryDocument>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

#[cfg(any(test, feature = "testing"))]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `document`.
    pub fn with_document(document: RegistryDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Copy of the last saved document.
    pub fn document(&self) -> Option<RegistryDocument> {
        self.document.lock().clone()
    }
}

#[cfg(any(test, feature = "testing"))]
impl SubscriptionStore for MemoryStore {
    fn load(&self) -> Result<Option<RegistryDocument>> {
        Ok(self.document.lock().clone())
    }

    fn save(&self, document: &RegistryDocument) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PaceError::Persistence("memory store refused save".to_string()));
        }
        *self.document.lock() = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
