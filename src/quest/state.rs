//! Quest State Tracking
//!
//! Runtime tasks, task groups and quest instances. Everything here is
//! mutated only through [`QuestSystem`](super::system::QuestSystem); the
//! mutators are crate-private.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::action::TaskAction;
use super::definition::{QuestDefinition, TaskGroupTemplate, TaskTemplate};
use super::events::{QuestNotification, WorldEvent};
use super::target::TaskTarget;
use crate::sync::record::{RemoteProgressRecord, RemoteState};

/// Lifecycle state of a quest instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    Active,
    Completed,
    Canceled,
}

impl QuestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestState::Active => "active",
            QuestState::Completed => "completed",
            QuestState::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuestState::Active)
    }
}

/// Runtime task: one action, its targets and a success counter
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    action: TaskAction,
    targets: Vec<TaskTarget>,
    required: u32,
    current: u32,
}

impl Task {
    pub fn from_template(template: &TaskTemplate) -> Self {
        Self {
            action: template.action,
            targets: template.targets.clone(),
            required: template.required,
            current: 0,
        }
    }

    pub fn action(&self) -> TaskAction {
        self.action
    }

    pub fn targets(&self) -> &[TaskTarget] {
        &self.targets
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.required
    }

    pub fn matches(&self, event: &WorldEvent) -> bool {
        self.targets.iter().any(|target| target.matches(event))
    }

    pub fn progress_percent(&self) -> f32 {
        if self.required == 0 {
            return 1.0;
        }
        self.current as f32 / self.required as f32
    }

    /// Run the action for a matched event. Returns `(prev, new)` when the
    /// counter moved.
    pub(crate) fn apply(&mut self, event: &WorldEvent) -> Option<(u32, u32)> {
        if self.is_complete() {
            return None;
        }
        let prev = self.current;
        let raw = self.action.run(prev, event.contribution());
        // Accumulate-kind actions can overshoot; counters never go back
        self.current = raw.clamp(prev, self.required);
        (self.current != prev).then_some((prev, self.current))
    }

    /// Set progress directly (restore path)
    pub(crate) fn set_progress(&mut self, amount: u32) {
        self.current = amount.min(self.required);
    }
}

/// Tasks that must all complete together
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    tasks: Vec<Task>,
}

impl TaskGroup {
    pub fn from_template(template: &TaskGroupTemplate) -> Self {
        Self {
            tasks: template.tasks.iter().map(Task::from_template).collect(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(Task::is_complete)
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }
}

/// A live quest
#[derive(Debug, Clone)]
pub struct QuestInstance {
    definition: Arc<QuestDefinition>,
    groups: Vec<TaskGroup>,
    current_group: usize,
    state: QuestState,
    reward_claimed: bool,
}

impl QuestInstance {
    pub(crate) fn new(definition: Arc<QuestDefinition>) -> Self {
        let groups = definition.groups.iter().map(TaskGroup::from_template).collect();
        Self {
            definition,
            groups,
            current_group: 0,
            state: QuestState::Active,
            reward_claimed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &Arc<QuestDefinition> {
        &self.definition
    }

    pub fn state(&self) -> QuestState {
        self.state
    }

    pub fn reward_claimed(&self) -> bool {
        self.reward_claimed
    }

    pub fn current_group_index(&self) -> usize {
        self.current_group
    }

    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    pub fn current_group(&self) -> Option<&TaskGroup> {
        self.groups.get(self.current_group)
    }

    pub fn is_active(&self) -> bool {
        self.state == QuestState::Active
    }

    pub fn is_complete(&self) -> bool {
        self.state == QuestState::Completed
    }

    /// All groups done; completion may still wait for a turn-in
    pub fn is_ready_to_complete(&self) -> bool {
        self.current_group + 1 >= self.groups.len()
            && self.groups.last().map_or(true, TaskGroup::is_complete)
    }

    /// Fraction of all tasks' success across the quest
    pub fn progress_percent(&self) -> f32 {
        let (current, required) = self
            .groups
            .iter()
            .flat_map(|g| g.tasks.iter())
            .fold((0u64, 0u64), |(c, r), t| (c + t.current as u64, r + t.required as u64));
        if required == 0 {
            return 1.0;
        }
        current as f32 / required as f32
    }

    /// Feed an event to the current group's tasks.
    ///
    /// Tasks in later groups are not evaluated. Returns true when anything
    /// changed.
    pub(crate) fn handle_event(
        &mut self,
        event: &WorldEvent,
        notifications: &mut Vec<QuestNotification>,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        let group_index = self.current_group;
        let Some(group) = self.groups.get_mut(group_index) else {
            return false;
        };

        let mut changed = false;
        for (task_index, task) in group.tasks_mut().iter_mut().enumerate() {
            if !task.matches(event) {
                continue;
            }
            if let Some((prev, new)) = task.apply(event) {
                changed = true;
                notifications.push(QuestNotification::ProgressChanged {
                    quest_id: self.definition.id.clone(),
                    group_index,
                    task_index,
                    new_success: new,
                    prev_success: prev,
                });
            }
        }

        if changed {
            self.advance_groups(notifications);
            if self.definition.auto_complete && self.is_ready_to_complete() {
                self.complete(notifications);
            }
        }
        changed
    }

    /// Move past every completed non-final group
    fn advance_groups(&mut self, notifications: &mut Vec<QuestNotification>) {
        while self.current_group + 1 < self.groups.len()
            && self.groups[self.current_group].is_complete()
        {
            self.current_group += 1;
            notifications.push(QuestNotification::GroupAdvanced {
                quest_id: self.definition.id.clone(),
                group_index: self.current_group,
            });
        }
    }

    /// Enter the Completed state, granting rewards unless already claimed.
    /// Returns true when rewards were granted by this call.
    pub(crate) fn complete(&mut self, notifications: &mut Vec<QuestNotification>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = QuestState::Completed;
        notifications.push(QuestNotification::StateChanged {
            quest_id: self.definition.id.clone(),
            state: QuestState::Completed,
        });

        if self.reward_claimed {
            return false;
        }
        self.reward_claimed = true;
        notifications.push(QuestNotification::RewardsGranted {
            quest_id: self.definition.id.clone(),
            rewards: self.definition.rewards.clone(),
        });
        true
    }

    pub(crate) fn cancel(&mut self, notifications: &mut Vec<QuestNotification>) {
        if !self.is_active() {
            return;
        }
        self.state = QuestState::Canceled;
        notifications.push(QuestNotification::StateChanged {
            quest_id: self.definition.id.clone(),
            state: QuestState::Canceled,
        });
    }

    /// Pre-seed the reward flag before replaying restored progress
    pub(crate) fn mark_reward_claimed(&mut self, claimed: bool) {
        self.reward_claimed = claimed;
    }

    /// Jump to a group, treating every earlier group as finished
    pub(crate) fn restore_group(&mut self, group_index: usize) {
        let target = group_index.min(self.groups.len().saturating_sub(1));
        for group in &mut self.groups[..target] {
            for task in group.tasks_mut() {
                let required = task.required();
                task.set_progress(required);
            }
        }
        self.current_group = target;
    }

    /// Set a task in the current group. Out-of-range indices are ignored.
    pub(crate) fn restore_task(&mut self, task_index: usize, progress: u32) -> bool {
        let Some(group) = self.groups.get_mut(self.current_group) else {
            return false;
        };
        match group.tasks_mut().get_mut(task_index) {
            Some(task) => {
                task.set_progress(progress);
                true
            }
            None => false,
        }
    }

    /// Re-run group advancement and auto-completion after restored progress
    pub(crate) fn settle(&mut self, notifications: &mut Vec<QuestNotification>) {
        if !self.is_active() {
            return;
        }
        self.advance_groups(notifications);
        if self.definition.auto_complete && self.is_ready_to_complete() {
            self.complete(notifications);
        }
    }

    /// Mirror of this instance for the remote store.
    ///
    /// `progress`/`taskIndex` address the first unfinished task of the
    /// current group, or the last task once the group is done.
    pub fn snapshot(&self) -> RemoteProgressRecord {
        let group = self.current_group();
        let task_progress: Vec<u32> = group
            .map(|g| g.tasks.iter().map(Task::current).collect())
            .unwrap_or_default();
        let task_index = group
            .and_then(|g| g.tasks.iter().position(|t| !t.is_complete()))
            .unwrap_or_else(|| task_progress.len().saturating_sub(1));
        let (progress, required) = group
            .and_then(|g| g.tasks.get(task_index))
            .map(|t| (t.current, t.required))
            .unwrap_or((0, 0));

        let state = match self.state {
            QuestState::Completed => RemoteState::Completed,
            QuestState::Canceled => RemoteState::Canceled,
            QuestState::Active if self.progress_percent() > 0.0 => RemoteState::InProgress,
            QuestState::Active => RemoteState::Accepted,
        };

        RemoteProgressRecord {
            state,
            progress,
            required,
            task_index,
            group_index: self.current_group,
            task_progress,
            reward_claimed: self.reward_claimed,
            updated_at: Some(Utc::now()),
        }
    }
}
