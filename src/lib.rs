pub mod config;
pub mod error;
pub mod quest;
pub mod sync;

pub use config::{EngineConfig, StoreBackend, StoreConfig};
pub use error::{QuestError, StoreError};
pub use quest::{QuestDefinition, QuestNotification, QuestRegistry, QuestSystem, WorldEvent};
pub use sync::{ProgressStore, ProgressSyncBridge};
