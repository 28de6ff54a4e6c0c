//! Task Targets
//!
//! Matchers that decide whether a world event is relevant to a task.

use serde::{Deserialize, Serialize};

use super::events::WorldEvent;

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A single target criterion. A task matches an event when any of its
/// targets matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskTarget {
    /// Enemy prototype id (e.g. "goblin")
    #[serde(rename = "entity")]
    EntityId { id: String },
    /// Item id plus display name
    #[serde(rename = "item")]
    ItemId {
        id: String,
        #[serde(default)]
        name: String,
    },
    /// Sphere around a point; inclusive on the boundary
    Position { center: Vec3, radius: f32 },
    /// NPC id plus a descriptive tag
    #[serde(rename = "npc")]
    NpcId {
        id: String,
        #[serde(default)]
        tag: String,
    },
    /// Any elapsed-time tick (survival tasks)
    Clock,
}

impl TaskTarget {
    pub fn entity(id: impl Into<String>) -> Self {
        TaskTarget::EntityId { id: id.into() }
    }

    pub fn item(id: impl Into<String>, name: impl Into<String>) -> Self {
        TaskTarget::ItemId {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn position(center: Vec3, radius: f32) -> Self {
        TaskTarget::Position { center, radius }
    }

    pub fn npc(id: impl Into<String>, tag: impl Into<String>) -> Self {
        TaskTarget::NpcId {
            id: id.into(),
            tag: tag.into(),
        }
    }

    /// Check whether this target is satisfied by the event.
    ///
    /// Never fails: an event of a different kind simply does not match.
    pub fn matches(&self, event: &WorldEvent) -> bool {
        match (self, event) {
            (TaskTarget::EntityId { id }, WorldEvent::EnemyKilled { id: killed, .. }) => {
                id == killed
            }
            (TaskTarget::ItemId { id, .. }, WorldEvent::ItemCollected { id: item, .. }) => {
                id == item
            }
            (TaskTarget::Position { center, radius }, WorldEvent::LocationReached { pos }) => {
                center.distance(pos) <= *radius
            }
            (TaskTarget::NpcId { id, .. }, WorldEvent::NpcTalkedTo { id: npc }) => id == npc,
            (TaskTarget::Clock, WorldEvent::TimeElapsed { .. }) => true,
            _ => false,
        }
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            TaskTarget::EntityId { id } => format!("entity:{}", id),
            TaskTarget::ItemId { id, .. } => format!("item:{}", id),
            TaskTarget::Position { center, radius } => {
                format!("pos:({}, {}, {})r{}", center.x, center.y, center.z, radius)
            }
            TaskTarget::NpcId { id, .. } => format!("npc:{}", id),
            TaskTarget::Clock => "clock".to_string(),
        }
    }
}
