//! Task Actions
//!
//! Accumulation logic turning an event contribution into a task's new
//! absolute success count. Actions come in three kinds with separate
//! contracts; an event only advances a task whose action is of the same kind.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The part of a world event that feeds a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    /// A delta to add (kills, picked-up items)
    Count(u32),
    /// A one-shot happening (arrived somewhere, spoke to someone)
    Occurred,
    /// Elapsed time in seconds
    Elapsed(u32),
}

/// How an action interprets contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Accumulate,
    Trigger,
    Threshold,
}

/// Gameplay verbs a task can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
    /// Kill X enemies
    KillEnemies,
    /// Collect X items
    CollectItems,
    /// Reach a location
    ReachLocation,
    /// Talk to an NPC
    TalkToNpc,
    /// Stay alive for a number of seconds
    SurviveTime { seconds: u32 },
}

impl TaskAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            TaskAction::KillEnemies | TaskAction::CollectItems => ActionKind::Accumulate,
            TaskAction::ReachLocation | TaskAction::TalkToNpc => ActionKind::Trigger,
            TaskAction::SurviveTime { .. } => ActionKind::Threshold,
        }
    }

    /// Parse the short names used in quest files
    pub fn from_str(s: &str, seconds: Option<u32>) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kill_enemies" | "kill" => Some(TaskAction::KillEnemies),
            "collect_items" | "collect" => Some(TaskAction::CollectItems),
            "reach_location" | "reach" | "location" => Some(TaskAction::ReachLocation),
            "talk_to_npc" | "talk" => Some(TaskAction::TalkToNpc),
            "survive_time" | "survive" => seconds.map(|seconds| TaskAction::SurviveTime { seconds }),
            _ => None,
        }
    }

    /// Accumulate-kind: add the count. Clamping is the task's job.
    pub fn accumulate(&self, current: u32, count: u32) -> u32 {
        current.saturating_add(count)
    }

    /// Trigger-kind: the event happened, so the task is done.
    pub fn trigger(&self, _current: u32) -> u32 {
        1
    }

    /// Threshold-kind: sum elapsed time, never past the threshold.
    pub fn elapse(&self, current: u32, seconds: u32) -> u32 {
        let threshold = self.threshold().unwrap_or(u32::MAX);
        let total = current.saturating_add(seconds);
        if total >= threshold { threshold } else { total }
    }

    /// Threshold for time-based actions
    pub fn threshold(&self) -> Option<u32> {
        match self {
            TaskAction::SurviveTime { seconds } => Some(*seconds),
            _ => None,
        }
    }

    /// Compute the new absolute success count.
    ///
    /// A contribution of the wrong kind leaves `current` unchanged.
    pub fn run(&self, current: u32, contribution: Contribution) -> u32 {
        match (self.kind(), contribution) {
            (ActionKind::Accumulate, Contribution::Count(count)) => self.accumulate(current, count),
            (ActionKind::Trigger, Contribution::Occurred) => self.trigger(current),
            (ActionKind::Threshold, Contribution::Elapsed(seconds)) => self.elapse(current, seconds),
            (kind, contribution) => {
                debug!(
                    "Ignoring {:?} contribution for {:?} action {:?}",
                    contribution, kind, self
                );
                current
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::KillEnemies => "kill_enemies",
            TaskAction::CollectItems => "collect_items",
            TaskAction::ReachLocation => "reach_location",
            TaskAction::TalkToNpc => "talk_to_npc",
            TaskAction::SurviveTime { .. } => "survive_time",
        }
    }
}
