//! Progress Sync Bridge
//!
//! Mirrors quest state into the remote progress store and restores it at
//! session start. Writes never block the game loop: each quest gets its own
//! write queue drained by a spawned task, so updates to one quest land in
//! order while different quests proceed independently. A failed write is
//! logged and dropped; local state stays authoritative.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::record::{
    quest_path, user_quests_path, ProgressPatch, RemoteProgressRecord, RemoteState,
};
use super::store::ProgressStore;
use crate::quest::{QuestNotification, QuestRegistry, QuestState, QuestSystem};

enum WriteOp {
    Update(ProgressPatch),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// Outcome of a session restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Quests re-created from remote records
    pub restored: Vec<String>,
    /// Records for quests already tracked locally
    pub skipped: Vec<String>,
    /// Records whose quest id has no definition
    pub unknown: Vec<String>,
    /// Records that could not be decoded
    pub invalid: Vec<String>,
    /// The remote read itself failed
    pub fetch_failed: bool,
}

pub struct ProgressSyncBridge {
    store: Arc<dyn ProgressStore>,
    user_id: String,
    queues: DashMap<String, mpsc::UnboundedSender<WriteOp>>,
}

impl ProgressSyncBridge {
    pub fn new(store: Arc<dyn ProgressStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            queues: DashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Queue remote writes for a batch of drained notifications.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    pub fn mirror(&self, system: &QuestSystem, notifications: &[QuestNotification]) {
        // One entry per quest, in first-seen order
        let mut order: Vec<&str> = Vec::new();
        let mut changes: HashMap<&str, QuestChanges> = HashMap::new();

        for notification in notifications {
            let quest_id = notification.quest_id();
            let entry = changes.entry(quest_id).or_insert_with(|| {
                order.push(quest_id);
                QuestChanges::default()
            });
            match notification {
                // A re-registration supersedes whatever the old instance did
                QuestNotification::Registered { .. } => {
                    *entry = QuestChanges {
                        registered: true,
                        ..QuestChanges::default()
                    }
                }
                QuestNotification::ProgressChanged { .. }
                | QuestNotification::GroupAdvanced { .. } => entry.progressed = true,
                QuestNotification::StateChanged { state, .. } => entry.state = Some(*state),
                QuestNotification::RewardsGranted { .. } => {}
            }
        }

        for quest_id in order {
            let Some(instance) = system.get(quest_id) else {
                continue;
            };
            if !instance.definition().savable {
                debug!("Quest {} is not savable, skipping mirror", quest_id);
                continue;
            }

            let snapshot = instance.snapshot();
            let change = &changes[quest_id];

            if change.registered {
                self.enqueue(quest_id, WriteOp::Update(ProgressPatch::accepted(&snapshot)));
            }
            if change.progressed && instance.is_active() {
                self.enqueue(quest_id, WriteOp::Update(ProgressPatch::in_progress(&snapshot)));
            }
            match change.state {
                Some(QuestState::Completed) => {
                    self.enqueue(quest_id, WriteOp::Update(ProgressPatch::completed(&snapshot)))
                }
                Some(QuestState::Canceled) => {
                    self.enqueue(quest_id, WriteOp::Update(ProgressPatch::canceled()))
                }
                Some(QuestState::Active) | None => {}
            }
        }
    }

    /// Queue a full write of every savable quest the system knows about
    pub fn sync_all(&self, system: &QuestSystem) {
        let instances = system
            .active()
            .chain(system.completed())
            .chain(system.canceled());

        let mut count = 0;
        for instance in instances.filter(|q| q.definition().savable) {
            let snapshot = instance.snapshot();
            self.enqueue(instance.id(), WriteOp::Update(ProgressPatch::for_snapshot(&snapshot)));
            count += 1;
        }
        info!("Queued full sync of {} quest(s) for user {}", count, self.user_id);
    }

    /// Drop the remote record of a quest
    pub fn forget(&self, quest_id: &str) {
        self.enqueue(quest_id, WriteOp::Remove);
    }

    /// Wait until every write queued so far has been attempted
    pub async fn flush(&self) {
        let acks: Vec<oneshot::Receiver<()>> = self
            .queues
            .iter()
            .filter_map(|entry| {
                let (tx, rx) = oneshot::channel();
                entry.value().send(WriteOp::Flush(tx)).ok().map(|_| rx)
            })
            .collect();

        futures::future::join_all(acks).await;
    }

    /// Rebuild local quests from the remote mirror.
    ///
    /// Run once at session start, before any event is dispatched. Records
    /// for unknown quests or quests already tracked locally are skipped; a
    /// bad record never stops the others. Notifications produced while
    /// replaying are discarded, except the completion and reward grant of
    /// quests that replay finished or paid out beyond their mirrored record.
    /// Those still need delivering and mirroring.
    pub async fn restore(&self, system: &mut QuestSystem, registry: &QuestRegistry) -> RestoreReport {
        let mut report = RestoreReport::default();
        let path = user_quests_path(&self.user_id);

        let records = match self.store.get(&path).await {
            Ok(Some(Value::Object(records))) => records,
            Ok(Some(other)) => {
                warn!("Unexpected progress data at {}: {}", path, other);
                return report;
            }
            Ok(None) => {
                info!("No remote progress for user {}", self.user_id);
                return report;
            }
            Err(e) => {
                error!("Failed to fetch progress for user {}: {}", self.user_id, e);
                report.fetch_failed = true;
                return report;
            }
        };

        let mark = system.notification_mark();
        let mut diverged: HashSet<String> = HashSet::new();

        for (quest_id, value) in records {
            let record = match RemoteProgressRecord::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable progress record {}: {}", quest_id, e);
                    report.invalid.push(quest_id);
                    continue;
                }
            };

            let Some(definition) = registry.get(&quest_id).await else {
                warn!("Skipping progress for unknown quest {}", quest_id);
                report.unknown.push(quest_id);
                continue;
            };

            if system.contains(&quest_id) {
                debug!("Quest {} already tracked locally, not restoring", quest_id);
                report.skipped.push(quest_id);
                continue;
            }

            system.register(definition);
            let restored = system.with_active(&quest_id, |instance, notes| {
                if record.state == RemoteState::Canceled {
                    instance.cancel(notes);
                    return (instance.state(), instance.reward_claimed());
                }

                // Before any replay, so a finished quest never pays out twice
                instance.mark_reward_claimed(record.reward_claimed);

                instance.restore_group(record.group_index);
                for (task_index, progress) in record.task_progress.iter().enumerate() {
                    instance.restore_task(task_index, *progress);
                }
                if !instance.restore_task(record.task_index, record.progress) {
                    warn!(
                        "Quest {} has no task {} in group {}",
                        quest_id, record.task_index, record.group_index
                    );
                }
                instance.settle(notes);

                if instance.is_active() && instance.reward_claimed() && record.state != RemoteState::Completed {
                    // Paid out but never marked completed; close it without paying again
                    warn!(
                        "Quest {} has a claimed reward but is {:?} remotely, completing it",
                        quest_id, record.state
                    );
                }
                if instance.is_active() && (record.state == RemoteState::Completed || instance.reward_claimed()) {
                    instance.complete(notes);
                }
                (instance.state(), instance.reward_claimed())
            });

            let state = restored.map(|(state, _)| state);
            let claimed_now = restored.is_some_and(|(_, claimed)| claimed) && !record.reward_claimed;
            let completed_now = state == Some(QuestState::Completed) && record.state != RemoteState::Completed;
            if completed_now || claimed_now {
                info!("Quest {} moved past its mirrored progress during restore", quest_id);
                diverged.insert(quest_id.clone());
            }
            debug!("Restored quest {} as {:?}", quest_id, state);
            report.restored.push(quest_id);
        }

        system.retain_notifications_since(mark, |n| {
            diverged.contains(n.quest_id())
                && matches!(
                    n,
                    QuestNotification::StateChanged { .. } | QuestNotification::RewardsGranted { .. }
                )
        });

        info!(
            "Restored {} quest(s) for user {} ({} skipped, {} unknown, {} invalid)",
            report.restored.len(),
            self.user_id,
            report.skipped.len(),
            report.unknown.len(),
            report.invalid.len()
        );
        report
    }

    fn enqueue(&self, quest_id: &str, op: WriteOp) {
        let sender = self
            .queues
            .entry(quest_id.to_string())
            .or_insert_with(|| self.spawn_writer(quest_id))
            .clone();

        if sender.send(op).is_err() {
            warn!("Write queue for quest {} is closed, dropping write", quest_id);
            self.queues.remove(quest_id);
        }
    }

    fn spawn_writer(&self, quest_id: &str) -> mpsc::UnboundedSender<WriteOp> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let store = Arc::clone(&self.store);
        let path = quest_path(&self.user_id, quest_id);

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Update(patch) => {
                        let fields = match patch.into_fields() {
                            Ok(fields) => fields,
                            Err(e) => {
                                error!("Failed to encode progress for {}: {}", path, e);
                                continue;
                            }
                        };
                        if let Err(e) = store.update(&path, fields).await {
                            warn!("Progress write to {} failed: {}", path, e);
                        }
                    }
                    WriteOp::Remove => {
                        if let Err(e) = store.remove(&path).await {
                            warn!("Progress remove at {} failed: {}", path, e);
                        }
                    }
                    WriteOp::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Write queue for {} closed", path);
        });

        tx
    }
}

#[derive(Debug, Default)]
struct QuestChanges {
    registered: bool,
    progressed: bool,
    state: Option<QuestState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::quest::{
        QuestDefinition, Reward, TaskAction, TaskGroupTemplate, TaskTarget, TaskTemplate,
        WorldEvent,
    };
    use crate::sync::store::{MemoryStore, MockProgressStore};
    use serde_json::{json, Map};

    fn kill_goblin() -> QuestDefinition {
        QuestDefinition::builder("kill_goblin")
            .task(TaskTemplate::new(TaskAction::KillEnemies, 3).target(TaskTarget::entity("goblin")))
            .reward(Reward::Gold { amount: 30 })
            .build()
            .unwrap()
    }

    fn escort() -> QuestDefinition {
        QuestDefinition::builder("escort")
            .group(
                TaskGroupTemplate::new()
                    .task(TaskTemplate::new(TaskAction::KillEnemies, 4).target(TaskTarget::entity("bandit")))
                    .task(TaskTemplate::new(TaskAction::CollectItems, 2).target(TaskTarget::item("crate", "Crate"))),
            )
            .group(
                TaskGroupTemplate::new()
                    .task(TaskTemplate::new(TaskAction::SurviveTime { seconds: 30 }, 30).target(TaskTarget::Clock))
                    .task(TaskTemplate::new(TaskAction::TalkToNpc, 1).target(TaskTarget::npc("merchant", ""))),
            )
            .reward(Reward::Exp { amount: 200 })
            .build()
            .unwrap()
    }

    fn registry() -> QuestRegistry {
        QuestRegistry::from_definitions([kill_goblin(), escort()])
    }

    fn goblin_kill() -> WorldEvent {
        WorldEvent::EnemyKilled {
            id: "goblin".into(),
            count: 1,
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn reward_grants(notes: &[QuestNotification]) -> usize {
        notes
            .iter()
            .filter(|n| matches!(n, QuestNotification::RewardsGranted { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_mirror_writes_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let registry = registry();
        let mut system = QuestSystem::new();

        system.register(registry.get("kill_goblin").await.unwrap());
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "accepted");
        assert_eq!(record["required"], 3);
        assert_eq!(record["rewardClaimed"], false);

        system.dispatch(&goblin_kill());
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "in_progress");
        assert_eq!(record["progress"], 1);

        system.dispatch(&goblin_kill());
        system.dispatch(&goblin_kill());
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "completed");
        assert_eq!(record["progress"], 3);
        assert_eq!(record["rewardClaimed"], true);
    }

    #[tokio::test]
    async fn test_cancel_only_updates_state() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let registry = registry();
        let mut system = QuestSystem::new();

        system.register(registry.get("kill_goblin").await.unwrap());
        system.dispatch(&goblin_kill());
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;
        let before = store.fields("users/u1/quests/kill_goblin").unwrap();

        system.cancel("kill_goblin").unwrap();
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        let after = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(after["state"], "canceled");
        assert_eq!(after["progress"], before["progress"]);
        assert_eq!(after["taskProgress"], before["taskProgress"]);
        assert_ne!(after["updatedAt"], Value::Null);
    }

    #[tokio::test]
    async fn test_reregister_in_one_batch_stays_active_remotely() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let registry = registry();
        let mut system = QuestSystem::new();

        system.register(registry.get("kill_goblin").await.unwrap());
        system.dispatch(&goblin_kill());
        system.cancel("kill_goblin").unwrap();
        system.register(registry.get("kill_goblin").await.unwrap());

        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        assert!(system.is_active("kill_goblin"));
        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "accepted");
        assert_eq!(record["progress"], 0);
    }

    #[tokio::test]
    async fn test_forget_removes_record() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let registry = registry();
        let mut system = QuestSystem::new();

        system.register(registry.get("kill_goblin").await.unwrap());
        system.register(registry.get("escort").await.unwrap());
        bridge.sync_all(&system);
        bridge.forget("kill_goblin");
        bridge.flush().await;

        assert!(store.fields("users/u1/quests/kill_goblin").is_none());
        assert!(store.fields("users/u1/quests/escort").is_some());
    }

    #[tokio::test]
    async fn test_non_savable_quest_is_not_mirrored() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();

        let mut quest = kill_goblin();
        quest.savable = false;
        system.register(Arc::new(quest));
        system.dispatch(&goblin_kill());
        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_restore_completed_record_does_not_regrant() {
        let store = Arc::new(MemoryStore::new());
        store
            .update(
                "users/u1/quests/kill_goblin",
                fields(json!({
                    "state": "completed",
                    "rewardClaimed": true,
                    "progress": 3,
                    "required": 3
                })),
            )
            .await
            .unwrap();

        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();
        let report = bridge.restore(&mut system, &registry()).await;

        assert_eq!(report.restored, vec!["kill_goblin".to_string()]);
        let quest = system.get("kill_goblin").unwrap();
        assert_eq!(quest.state(), QuestState::Completed);
        assert!(quest.reward_claimed());
        assert_eq!(quest.groups()[0].tasks()[0].current(), 3);
        assert!(system.drain_notifications().is_empty());

        // Turn-in afterwards is still a no-op
        assert_eq!(system.complete("kill_goblin"), Ok(false));
        assert_eq!(reward_grants(&system.drain_notifications()), 0);
    }

    #[tokio::test]
    async fn test_restore_completed_unclaimed_record_delivers_reward() {
        let store = Arc::new(MemoryStore::new());
        store
            .update(
                "users/u1/quests/kill_goblin",
                fields(json!({
                    "state": "completed",
                    "rewardClaimed": false,
                    "progress": 3,
                    "required": 3
                })),
            )
            .await
            .unwrap();

        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();
        bridge.restore(&mut system, &registry()).await;

        let quest = system.get("kill_goblin").unwrap();
        assert_eq!(quest.state(), QuestState::Completed);
        assert!(quest.reward_claimed());
        let notes = system.drain_notifications();
        assert_eq!(reward_grants(&notes), 1);

        bridge.mirror(&system, &notes);
        bridge.flush().await;
        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["rewardClaimed"], true);
    }

    #[tokio::test]
    async fn test_restore_claimed_reward_closes_unfinished_quest() {
        let store = Arc::new(MemoryStore::new());
        store
            .update(
                "users/u1/quests/kill_goblin",
                fields(json!({
                    "state": "in_progress",
                    "rewardClaimed": true,
                    "progress": 1,
                    "required": 3
                })),
            )
            .await
            .unwrap();

        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();
        bridge.restore(&mut system, &registry()).await;

        let quest = system.get("kill_goblin").unwrap();
        assert_eq!(quest.state(), QuestState::Completed);
        assert!(quest.reward_claimed());
        assert_eq!(quest.groups()[0].tasks()[0].current(), 1);

        let notes = system.drain_notifications();
        assert_eq!(reward_grants(&notes), 0);
        bridge.mirror(&system, &notes);
        bridge.flush().await;
        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "completed");
    }

    #[tokio::test]
    async fn test_restore_canceled_record() {
        let store = Arc::new(MemoryStore::new());
        store
            .update(
                "users/u1/quests/kill_goblin",
                fields(json!({"state": "canceled", "progress": 2, "required": 3})),
            )
            .await
            .unwrap();

        let bridge = ProgressSyncBridge::new(store, "u1");
        let mut system = QuestSystem::new();
        bridge.restore(&mut system, &registry()).await;

        assert_eq!(system.state_of("kill_goblin"), Some(QuestState::Canceled));
        assert!(!system.is_active("kill_goblin"));
        // No progress replay for canceled quests
        let quest = system.get("kill_goblin").unwrap();
        assert_eq!(quest.groups()[0].tasks()[0].current(), 0);
    }

    #[tokio::test]
    async fn test_restore_skips_unknown_and_tracked_quests() {
        let store = Arc::new(MemoryStore::new());
        store
            .update("users/u1/quests/retired_quest", fields(json!({"state": "in_progress"})))
            .await
            .unwrap();
        store
            .update("users/u1/quests/kill_goblin", fields(json!({"state": "in_progress", "progress": 2})))
            .await
            .unwrap();
        store
            .update("users/u1/quests/escort", fields(json!({"state": "nonsense"})))
            .await
            .unwrap();

        let registry = registry();
        let mut system = QuestSystem::new();
        system.register(registry.get("kill_goblin").await.unwrap());

        let bridge = ProgressSyncBridge::new(store, "u1");
        let report = bridge.restore(&mut system, &registry).await;

        assert_eq!(report.unknown, vec!["retired_quest".to_string()]);
        assert_eq!(report.skipped, vec!["kill_goblin".to_string()]);
        assert_eq!(report.invalid, vec!["escort".to_string()]);
        assert!(report.restored.is_empty());
        // Local progress wins over the mirror
        let quest = system.get("kill_goblin").unwrap();
        assert_eq!(quest.groups()[0].tasks()[0].current(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry();

        let mut first = QuestSystem::new();
        first.register(registry.get("escort").await.unwrap());
        first.dispatch(&WorldEvent::EnemyKilled {
            id: "bandit".into(),
            count: 4,
        });
        first.dispatch(&WorldEvent::ItemCollected {
            id: "crate".into(),
            count: 2,
        });
        first.dispatch(&WorldEvent::TimeElapsed { seconds: 12 });

        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        bridge.sync_all(&first);
        bridge.flush().await;

        let mut resumed = QuestSystem::new();
        let other_device = ProgressSyncBridge::new(store, "u1");
        other_device.restore(&mut resumed, &registry).await;

        let a = first.get("escort").unwrap();
        let b = resumed.get("escort").unwrap();
        assert_eq!(a.state(), b.state());
        assert_eq!(a.current_group_index(), b.current_group_index());
        assert_eq!(a.groups(), b.groups());
        assert_eq!(a.reward_claimed(), b.reward_claimed());
        assert_eq!(b.groups()[1].tasks()[0].current(), 12);
    }

    #[tokio::test]
    async fn test_restore_finishing_quest_keeps_grant_notification() {
        let store = Arc::new(MemoryStore::new());
        // The completion write never made it; progress did
        store
            .update(
                "users/u1/quests/kill_goblin",
                fields(json!({"state": "in_progress", "progress": 3, "required": 3})),
            )
            .await
            .unwrap();

        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();
        bridge.restore(&mut system, &registry()).await;

        assert!(system.is_completed("kill_goblin"));
        let notes = system.drain_notifications();
        assert_eq!(reward_grants(&notes), 1);
        assert!(
            !notes
                .iter()
                .any(|n| matches!(n, QuestNotification::Registered { .. }))
        );

        bridge.mirror(&system, &notes);
        bridge.flush().await;
        let record = store.fields("users/u1/quests/kill_goblin").unwrap();
        assert_eq!(record["state"], "completed");
        assert_eq!(record["rewardClaimed"], true);
    }

    #[tokio::test]
    async fn test_writes_for_one_quest_stay_ordered() {
        let store = Arc::new(MemoryStore::new());
        let bridge = ProgressSyncBridge::new(store.clone(), "u1");
        let mut system = QuestSystem::new();
        system.register(Arc::new(
            QuestDefinition::builder("hoard")
                .task(TaskTemplate::new(TaskAction::CollectItems, 500).target(TaskTarget::item("coin", "Coin")))
                .build()
                .unwrap(),
        ));

        for _ in 0..200 {
            system.dispatch(&WorldEvent::ItemCollected {
                id: "coin".into(),
                count: 1,
            });
            let notes = system.drain_notifications();
            bridge.mirror(&system, &notes);
        }
        bridge.flush().await;

        let record = store.fields("users/u1/quests/hoard").unwrap();
        assert_eq!(record["progress"], 200);
    }

    #[tokio::test]
    async fn test_write_failure_is_isolated_per_quest() {
        let mut store = MockProgressStore::new();
        store
            .expect_update()
            .withf(|path, _| path.ends_with("/kill_goblin"))
            .returning(|_, _| Err(StoreError::backend("permission denied")));
        store
            .expect_update()
            .withf(|path, _| path.ends_with("/escort"))
            .times(1)
            .returning(|_, _| Ok(()));

        let registry = registry();
        let bridge = ProgressSyncBridge::new(Arc::new(store), "u1");
        let mut system = QuestSystem::new();
        system.register(registry.get("kill_goblin").await.unwrap());
        system.register(registry.get("escort").await.unwrap());

        let notes = system.drain_notifications();
        bridge.mirror(&system, &notes);
        bridge.flush().await;

        // Local state is untouched by the failed write
        assert!(system.is_active("kill_goblin"));
        system.dispatch(&goblin_kill());
        assert_eq!(system.get("kill_goblin").unwrap().groups()[0].tasks()[0].current(), 1);
    }

    #[tokio::test]
    async fn test_restore_survives_fetch_failure() {
        let mut store = MockProgressStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::backend("offline")));

        let bridge = ProgressSyncBridge::new(Arc::new(store), "u1");
        let mut system = QuestSystem::new();
        let report = bridge.restore(&mut system, &registry()).await;

        assert!(report.fetch_failed);
        assert_eq!(system.active().count(), 0);
    }
}
