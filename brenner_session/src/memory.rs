//! In-memory session storage

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::errors::{Result, StorageError};
use crate::session::{ensure_session_id, Session};
use crate::storage::{sort_sessions, EventBus, SessionStorage, StorageEvent, StorageEventKind};

/// Sessions held in a shared map; clones see the same data
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    events: EventBus,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: &Session) -> Result<()> {
        ensure_session_id(&session.id)?;
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        tracing::debug!("Saved session {} in memory", session.id);
        self.events.emit(StorageEventKind::Save, Some(&session.id));
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        ensure_session_id(id)?;
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sort_sessions(&mut sessions);
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        ensure_session_id(id)?;
        if self.sessions.write().await.remove(id).is_none() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        tracing::debug!("Deleted session {} from memory", id);
        self.events.emit(StorageEventKind::Delete, Some(id));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.sessions.write().await.clear();
        self.events.emit(StorageEventKind::Clear, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
