//! Quest System Module
//!
//! Data-driven quests built from task groups. Definitions load from TOML
//! (or are assembled in code), live instances track per-task progress and
//! advance group by group as world events arrive.

pub mod action;
pub mod definition;
pub mod events;
pub mod registry;
pub mod state;
pub mod system;
pub mod target;

pub use action::{ActionKind, Contribution, TaskAction};
pub use definition::{
    QuestCategory, QuestDefinition, QuestDefinitionBuilder, Reward, TaskGroupTemplate, TaskTemplate,
};
pub use events::{QuestNotification, WorldEvent};
pub use registry::{HotReloadEvent, QuestRegistry};
pub use state::{QuestInstance, QuestState, Task, TaskGroup};
pub use system::QuestSystem;
pub use target::{TaskTarget, Vec3};
