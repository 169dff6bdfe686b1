//! Session storage abstraction
//!
//! Backends implement [`SessionStorage`]; every successful mutation is
//! announced on a broadcast channel of [`StorageEvent`]s.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::errors::Result;
use crate::file::FileSessionStorage;
use crate::memory::InMemorySessionStorage;
use crate::session::Session;

/// Default quiet period before the autosaver writes
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEventKind {
    Save,
    Delete,
    Clear,
}

/// Change notification; `session_id` is `None` for `Clear`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub kind: StorageEventKind,
    pub session_id: Option<String>,
}

/// Trait for session persistence
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Store a session, replacing any previous copy with the same id
    async fn save(&self, session: &Session) -> Result<()>;

    /// Load a session; `Ok(None)` when it was never saved
    async fn load(&self, id: &str) -> Result<Option<Session>>;

    /// All stored sessions, most recently updated first
    async fn list(&self) -> Result<Vec<Session>>;

    /// Remove a session; fails with `NotFound` when absent
    async fn delete(&self, id: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Broadcast sender shared by the backends
#[derive(Clone, Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<StorageEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, kind: StorageEventKind, session_id: Option<&str>) {
        // no subscribers is not an error
        let _ = self.tx.send(StorageEvent {
            kind,
            session_id: session_id.map(str::to_string),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Most recently updated first, ties by id
pub(crate) fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Storage configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory for one JSON file per session; `None` keeps sessions in memory
    pub root_dir: Option<PathBuf>,
    /// Quiet period used by the autosaver
    pub debounce: Duration,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            root_dir: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn file(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root_dir.into()),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a storage backend from configuration
pub fn create_storage(config: &StorageConfig) -> Arc<dyn SessionStorage> {
    match &config.root_dir {
        Some(root) => Arc::new(FileSessionStorage::new(root.clone())),
        None => Arc::new(InMemorySessionStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::sample_session;

    #[test]
    fn test_config_constructors() {
        let mem = StorageConfig::in_memory();
        assert!(mem.root_dir.is_none());
        assert_eq!(mem.debounce, Duration::from_secs(1));
        assert_eq!(StorageConfig::default(), mem);

        let file = StorageConfig::file("/tmp/sessions").with_debounce(Duration::from_millis(250));
        assert_eq!(file.root_dir, Some(PathBuf::from("/tmp/sessions")));
        assert_eq!(file.debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_event_json() {
        let event = StorageEvent {
            kind: StorageEventKind::Save,
            session_id: Some("RS-1".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "save");
        assert_eq!(json["sessionId"], "RS-1");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(StorageEventKind::Clear, None);

        let mut rx = bus.subscribe();
        bus.emit(StorageEventKind::Delete, Some("RS-1"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, StorageEventKind::Delete);
        assert_eq!(event.session_id.as_deref(), Some("RS-1"));
    }

    #[test]
    fn test_sort_sessions() {
        let mut older = sample_session("A");
        let mut newer = sample_session("B");
        older.updated_at = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        newer.updated_at = chrono::DateTime::from_timestamp(2_000, 0).unwrap();
        let mut tied = sample_session("C");
        tied.updated_at = newer.updated_at;

        let mut sessions = vec![older, tied, newer];
        sort_sessions(&mut sessions);
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_create_storage_in_memory() {
        let storage = create_storage(&StorageConfig::in_memory());
        let session = sample_session("RS-1");
        storage.save(&session).await.unwrap();
        assert_eq!(storage.load("RS-1").await.unwrap(), Some(session));
    }
}
