//! Debounced autosave
//!
//! Callers mark a session dirty as often as they like; a background task
//! writes the newest snapshot once no newer mark arrived for the debounce
//! window. [`DebouncedSaver::flush`] writes any pending snapshot and waits
//! for the write. Dropping the saver only detaches the task: the pending
//! snapshot is written if the runtime is still running, and lost if it shuts
//! down first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::Session;
use crate::storage::SessionStorage;

pub struct DebouncedSaver {
    tx: watch::Sender<Option<Session>>,
    handle: JoinHandle<()>,
}

impl DebouncedSaver {
    /// Spawn the background writer; must be called inside a tokio runtime
    pub fn spawn(storage: Arc<dyn SessionStorage>, debounce: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(run(storage, rx, debounce));
        Self { tx, handle }
    }

    /// Replace the pending snapshot and restart the debounce window
    pub fn mark_dirty(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    /// Write any pending snapshot now and stop the writer
    pub async fn flush(self) {
        let Self { tx, handle } = self;
        drop(tx);
        if let Err(e) = handle.await {
            tracing::warn!("Autosave task ended abnormally: {}", e);
        }
    }
}

async fn run(
    storage: Arc<dyn SessionStorage>,
    mut rx: watch::Receiver<Option<Session>>,
    debounce: Duration,
) {
    while rx.changed().await.is_ok() {
        // wait for a quiet window; a closed sender ends the wait early
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let snapshot = rx.borrow_and_update().clone();
        if let Some(session) = snapshot {
            if let Err(e) = storage.save(&session).await {
                tracing::warn!("Autosave of session {} failed: {}", session.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionStorage;
    use crate::session::tests::sample_session;
    use crate::storage::StorageEventKind;

    fn count_saves(rx: &mut tokio::sync::broadcast::Receiver<crate::storage::StorageEvent>) -> usize {
        let mut saves = 0;
        while let Ok(event) = rx.try_recv() {
            if event.kind == StorageEventKind::Save {
                saves += 1;
            }
        }
        saves
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_marks() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let mut rx = storage.subscribe();
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(1));

        for question in ["first", "second", "third"] {
            let mut session = sample_session("RS-1");
            session.research_question = question.to_string();
            saver.mark_dirty(session);
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        // 900ms since the first mark, 300ms since the last
        assert!(storage.load("RS-1").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let saved = storage.load("RS-1").await.unwrap().unwrap();
        assert_eq!(saved.research_question, "third");
        assert_eq!(count_saves(&mut rx), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_save_twice() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let mut rx = storage.subscribe();
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(1));

        saver.mark_dirty(sample_session("RS-1"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        saver.mark_dirty(sample_session("RS-2"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(count_saves(&mut rx), 2);
        assert_eq!(storage.list().await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(60));

        saver.mark_dirty(sample_session("RS-1"));
        saver.flush().await;

        assert!(storage.load("RS-1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_writes_pending_while_runtime_runs() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(60));

        saver.mark_dirty(sample_session("RS-1"));
        drop(saver);
        // the detached task still needs the runtime to make progress
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(storage.load("RS-1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_marks() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let mut rx = storage.subscribe();
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(1));

        saver.flush().await;
        assert_eq!(count_saves(&mut rx), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_running() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let saver = DebouncedSaver::spawn(storage.clone(), Duration::from_secs(1));

        let mut bad = sample_session("RS-1");
        bad.id = "not valid".to_string();
        saver.mark_dirty(bad);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(storage.list().await.unwrap().is_empty());

        saver.mark_dirty(sample_session("RS-1"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(storage.load("RS-1").await.unwrap().is_some());
    }
}
