//! Remote progress mirroring
//!
//! Quest state is written through to a keyed document store so it survives
//! across sessions and devices, and read back once at session start.

pub mod bridge;
pub mod record;
pub mod sqlite;
pub mod store;

pub use bridge::{ProgressSyncBridge, RestoreReport};
pub use record::{ProgressPatch, RemoteProgressRecord, RemoteState};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, ProgressStore};
