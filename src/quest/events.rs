//! Quest Event Types
//!
//! World happenings that feed quest progress, and the notifications the
//! quest system emits in response.

use serde::{Deserialize, Serialize};

use super::action::Contribution;
use super::definition::Reward;
use super::state::QuestState;
use super::target::Vec3;

/// Events produced by combat, inventory, navigation and dialogue systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// Player killed one or more enemies of a prototype
    EnemyKilled {
        /// Entity prototype ID (e.g., "goblin")
        id: String,
        #[serde(default = "default_count")]
        count: u32,
    },

    /// Player picked up items
    ItemCollected {
        id: String,
        #[serde(default = "default_count")]
        count: u32,
    },

    /// Player position reported by navigation
    LocationReached { pos: Vec3 },

    /// Player finished a conversation with an NPC
    NpcTalkedTo { id: String },

    /// Survival clock tick
    TimeElapsed { seconds: u32 },
}

fn default_count() -> u32 {
    1
}

impl WorldEvent {
    /// What this event adds to a matching task
    pub fn contribution(&self) -> Contribution {
        match self {
            WorldEvent::EnemyKilled { count, .. } => Contribution::Count(*count),
            WorldEvent::ItemCollected { count, .. } => Contribution::Count(*count),
            WorldEvent::LocationReached { .. } => Contribution::Occurred,
            WorldEvent::NpcTalkedTo { .. } => Contribution::Occurred,
            WorldEvent::TimeElapsed { seconds } => Contribution::Elapsed(*seconds),
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            WorldEvent::EnemyKilled { .. } => "enemy_killed",
            WorldEvent::ItemCollected { .. } => "item_collected",
            WorldEvent::LocationReached { .. } => "location_reached",
            WorldEvent::NpcTalkedTo { .. } => "npc_talked_to",
            WorldEvent::TimeElapsed { .. } => "time_elapsed",
        }
    }
}

/// Notifications raised by the quest system, delivered in order through
/// [`QuestSystem::drain_notifications`](super::system::QuestSystem::drain_notifications).
#[derive(Debug, Clone, PartialEq)]
pub enum QuestNotification {
    /// A new instance was created
    Registered { quest_id: String },

    /// A task's success count changed
    ProgressChanged {
        quest_id: String,
        group_index: usize,
        task_index: usize,
        new_success: u32,
        prev_success: u32,
    },

    /// A non-final group completed and the quest moved on
    GroupAdvanced { quest_id: String, group_index: usize },

    /// Lifecycle transition
    StateChanged { quest_id: String, state: QuestState },

    /// Rewards handed out; raised at most once per quest instance
    RewardsGranted { quest_id: String, rewards: Vec<Reward> },
}

impl QuestNotification {
    pub fn quest_id(&self) -> &str {
        match self {
            QuestNotification::Registered { quest_id } => quest_id,
            QuestNotification::ProgressChanged { quest_id, .. } => quest_id,
            QuestNotification::GroupAdvanced { quest_id, .. } => quest_id,
            QuestNotification::StateChanged { quest_id, .. } => quest_id,
            QuestNotification::RewardsGranted { quest_id, .. } => quest_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_lines() {
        let event: WorldEvent =
            serde_json::from_str(r#"{"type":"enemy_killed","id":"goblin"}"#).unwrap();
        assert_eq!(
            event,
            WorldEvent::EnemyKilled {
                id: "goblin".into(),
                count: 1
            }
        );

        let event: WorldEvent = serde_json::from_str(
            r#"{"type":"location_reached","pos":{"x":1.0,"y":0.0,"z":2.5}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type(), "location_reached");
        assert_eq!(event.contribution(), Contribution::Occurred);
    }

    #[test]
    fn test_contributions() {
        let kill = WorldEvent::EnemyKilled {
            id: "orc".into(),
            count: 4,
        };
        assert_eq!(kill.contribution(), Contribution::Count(4));
        assert_eq!(
            WorldEvent::TimeElapsed { seconds: 20 }.contribution(),
            Contribution::Elapsed(20)
        );
        assert_eq!(
            WorldEvent::NpcTalkedTo { id: "elder".into() }.contribution(),
            Contribution::Occurred
        );
    }
}
