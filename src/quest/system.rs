//! Quest System
//!
//! Owns every quest instance of a player session and routes world events to
//! them. Runs on the game loop: no locking, every call finishes its state
//! transitions before returning. Notifications queue up until the caller
//! drains them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::definition::QuestDefinition;
use super::events::{QuestNotification, WorldEvent};
use super::state::{QuestInstance, QuestState};
use crate::error::QuestError;

#[derive(Debug, Default)]
pub struct QuestSystem {
    /// Active quests in registration order
    active: Vec<QuestInstance>,
    /// Completed and canceled quests
    archived: HashMap<String, QuestInstance>,
    notifications: Vec<QuestNotification>,
}

impl QuestSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a quest.
    ///
    /// If the quest is already active or completed the existing instance is
    /// returned unchanged. A canceled quest is replaced by a fresh instance.
    pub fn register(&mut self, definition: Arc<QuestDefinition>) -> &QuestInstance {
        let quest_id = definition.id.clone();

        if let Some(index) = self.active_index(&quest_id) {
            debug!("Quest {} already active", quest_id);
            return &self.active[index];
        }
        if self.is_completed(&quest_id) {
            debug!("Quest {} already completed", quest_id);
            return &self.archived[&quest_id];
        }
        if self.archived.remove(&quest_id).is_some() {
            info!("Re-registering previously canceled quest {}", quest_id);
        }

        info!("Registered quest {} ({})", definition.display_name, quest_id);
        self.active.push(QuestInstance::new(definition));
        self.notifications
            .push(QuestNotification::Registered { quest_id: quest_id.clone() });

        // A quest whose tasks are already satisfied settles immediately
        let index = self.active.len() - 1;
        self.active[index].settle(&mut self.notifications);
        self.archive_finished();

        match self.active_index(&quest_id) {
            Some(index) => &self.active[index],
            None => &self.archived[&quest_id],
        }
    }

    /// Route a world event to the current group of every active quest
    pub fn dispatch(&mut self, event: &WorldEvent) {
        let mut any_changed = false;
        for instance in &mut self.active {
            any_changed |= instance.handle_event(event, &mut self.notifications);
        }
        if any_changed {
            self.archive_finished();
        } else {
            debug!("No quest matched {} event", event.event_type());
        }
    }

    /// Turn in a quest whose tasks are all done.
    ///
    /// Returns `Ok(true)` when this call granted the rewards. Completing an
    /// already completed quest is `Ok(false)`.
    pub fn complete(&mut self, quest_id: &str) -> Result<bool, QuestError> {
        let Some(index) = self.active_index(quest_id) else {
            return match self.archived.get(quest_id) {
                Some(instance) if instance.is_complete() => Ok(false),
                Some(_) => Err(QuestError::NotActive(quest_id.to_string())),
                None => Err(QuestError::NotFound(quest_id.to_string())),
            };
        };

        if !self.active[index].is_ready_to_complete() {
            return Err(QuestError::NotReady(quest_id.to_string()));
        }

        let granted = self.active[index].complete(&mut self.notifications);
        self.archive_finished();
        info!("Quest {} completed (rewards granted: {})", quest_id, granted);
        Ok(granted)
    }

    /// Abandon a cancelable quest
    pub fn cancel(&mut self, quest_id: &str) -> Result<(), QuestError> {
        let Some(index) = self.active_index(quest_id) else {
            if self.archived.contains_key(quest_id) {
                return Err(QuestError::NotActive(quest_id.to_string()));
            }
            return Err(QuestError::NotFound(quest_id.to_string()));
        };

        if !self.active[index].definition().cancelable {
            warn!("Refusing to cancel non-cancelable quest {}", quest_id);
            return Err(QuestError::NotCancelable(quest_id.to_string()));
        }

        self.active[index].cancel(&mut self.notifications);
        self.archive_finished();
        info!("Quest {} canceled", quest_id);
        Ok(())
    }

    /// Take every notification raised since the last drain, in order
    pub fn drain_notifications(&mut self) -> Vec<QuestNotification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn active(&self) -> impl Iterator<Item = &QuestInstance> {
        self.active.iter()
    }

    pub fn completed(&self) -> impl Iterator<Item = &QuestInstance> {
        self.archived.values().filter(|q| q.is_complete())
    }

    pub fn canceled(&self) -> impl Iterator<Item = &QuestInstance> {
        self.archived
            .values()
            .filter(|q| q.state() == QuestState::Canceled)
    }

    pub fn get(&self, quest_id: &str) -> Option<&QuestInstance> {
        self.active
            .iter()
            .find(|q| q.id() == quest_id)
            .or_else(|| self.archived.get(quest_id))
    }

    pub fn is_active(&self, quest_id: &str) -> bool {
        self.active_index(quest_id).is_some()
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.archived
            .get(quest_id)
            .is_some_and(QuestInstance::is_complete)
    }

    /// Active or completed. Canceled quests do not count.
    pub fn contains(&self, quest_id: &str) -> bool {
        self.is_active(quest_id) || self.is_completed(quest_id)
    }

    pub fn state_of(&self, quest_id: &str) -> Option<QuestState> {
        self.get(quest_id).map(QuestInstance::state)
    }

    /// Mutate an active instance on the restore path, then archive it if
    /// the mutation finished it
    pub(crate) fn with_active<R>(
        &mut self,
        quest_id: &str,
        f: impl FnOnce(&mut QuestInstance, &mut Vec<QuestNotification>) -> R,
    ) -> Option<R> {
        let index = self.active_index(quest_id)?;
        let result = f(&mut self.active[index], &mut self.notifications);
        self.archive_finished();
        Some(result)
    }

    pub(crate) fn notification_mark(&self) -> usize {
        self.notifications.len()
    }

    /// Drop notifications queued after `mark` that fail the predicate
    pub(crate) fn retain_notifications_since(
        &mut self,
        mark: usize,
        keep: impl FnMut(&QuestNotification) -> bool,
    ) {
        let tail = self.notifications.split_off(mark.min(self.notifications.len()));
        self.notifications.extend(tail.into_iter().filter(keep));
    }

    fn active_index(&self, quest_id: &str) -> Option<usize> {
        self.active.iter().position(|q| q.id() == quest_id)
    }

    /// Move instances that reached a terminal state out of the active set
    fn archive_finished(&mut self) {
        if self.active.iter().all(QuestInstance::is_active) {
            return;
        }
        let (active, finished): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.active).into_iter().partition(QuestInstance::is_active);
        self.active = active;
        for instance in finished {
            debug!("Archiving quest {} as {}", instance.id(), instance.state().as_str());
            self.archived.insert(instance.id().to_string(), instance);
        }
    }
}
