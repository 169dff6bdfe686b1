//! Brenner Loop session persistence
//!
//! Storage for research sessions built on `brenner_core` records:
//! - [`Session`]: hypotheses, history, evidence, arenas and graveyard of one question
//! - [`SessionStorage`]: async save/load/list/delete with change events
//! - In-memory and JSON-file backends
//! - [`DebouncedSaver`]: coalesced background saves

pub mod autosave;
pub mod errors;
pub mod file;
pub mod memory;
pub mod session;
pub mod storage;

pub use autosave::DebouncedSaver;
pub use errors::{Result, StorageError};
pub use file::FileSessionStorage;
pub use memory::InMemorySessionStorage;
pub use session::Session;
pub use storage::{
    create_storage, SessionStorage, StorageConfig, StorageEvent, StorageEventKind,
    DEFAULT_DEBOUNCE,
};

/// Version of the session crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn init() {
    brenner_core::init();
    tracing::info!("Brenner Loop session storage v{}", VERSION);
}
