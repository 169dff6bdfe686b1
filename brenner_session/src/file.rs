//! JSON file session storage
//!
//! One `{id}.json` file per session under the root directory. Writes go to a
//! temporary file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::broadcast;

use crate::errors::{Result, StorageError};
use crate::session::{ensure_session_id, Session};
use crate::storage::{sort_sessions, EventBus, SessionStorage, StorageEvent, StorageEventKind};

const EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct FileSessionStorage {
    root: PathBuf,
    events: EventBus,
}

impl FileSessionStorage {
    /// The directory is created on first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            events: EventBus::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: &str) -> Result<PathBuf> {
        ensure_session_id(id)?;
        Ok(self.root.join(format!("{}.{}", id, EXTENSION)))
    }

    /// Paths of every session file; empty when the directory does not exist
    async fn session_files(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id)?;
        let json = serde_json::to_vec_pretty(session)?;

        fs::create_dir_all(&self.root).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved session {} to {}", session.id, path.display());
        self.events.emit(StorageEventKind::Save, Some(&session.id));
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let path = self.session_path(id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Files that fail to parse are skipped with a warning
    async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for path in self.session_files().await? {
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!("Skipping unreadable session file {}: {}", path.display(), e),
            }
        }
        sort_sessions(&mut sessions);
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.session_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!("Deleted session file {}", path.display());
        self.events.emit(StorageEventKind::Delete, Some(id));
        Ok(())
    }

    /// Removes session files only; other files in the directory stay
    async fn clear(&self) -> Result<()> {
        for path in self.session_files().await? {
            fs::remove_file(&path).await?;
        }
        self.events.emit(StorageEventKind::Clear, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
