use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use quest_progression::config::{EngineConfig, StoreBackend};
use quest_progression::quest::{QuestNotification, QuestRegistry, QuestSystem, WorldEvent};
use quest_progression::sync::{MemoryStore, ProgressStore, ProgressSyncBridge, SqliteStore};

/// One line of runner input: a world event, or a turn-in/cancel request
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Command { command: Command, quest_id: String },
    Event(WorldEvent),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Command {
    Complete,
    Cancel,
}

fn load_config() -> EngineConfig {
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        return EngineConfig::default();
    };
    match EngineConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet
            eprintln!("{}, using defaults", e);
            EngineConfig::default()
        }
    }
}

fn init_logging(config: &EngineConfig) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    match config.log_filter.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Invalid log_filter {:?}: {}", config.log_filter, e),
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_store(config: &EngineConfig) -> Option<Arc<dyn ProgressStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory progress store");
            Some(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => match SqliteStore::new(&config.store.database_url).await {
            Ok(store) => {
                info!("Using SQLite progress store at {}", config.store.database_url);
                Some(Arc::new(store))
            }
            Err(e) => {
                error!("Failed to open progress store: {}", e);
                None
            }
        },
    }
}

fn log_notification(notification: &QuestNotification) {
    match notification {
        QuestNotification::Registered { quest_id } => info!("[{}] registered", quest_id),
        QuestNotification::ProgressChanged {
            quest_id,
            group_index,
            task_index,
            new_success,
            prev_success,
        } => info!(
            "[{}] group {} task {}: {} -> {}",
            quest_id, group_index, task_index, prev_success, new_success
        ),
        QuestNotification::GroupAdvanced {
            quest_id,
            group_index,
        } => info!("[{}] advanced to group {}", quest_id, group_index),
        QuestNotification::StateChanged { quest_id, state } => {
            info!("[{}] is now {}", quest_id, state.as_str())
        }
        QuestNotification::RewardsGranted { quest_id, rewards } => {
            info!("[{}] rewards granted: {:?}", quest_id, rewards)
        }
    }
}

#[tokio::main]
async fn main() {
    let config = load_config();
    init_logging(&config);

    // Load quest registry from TOML files
    let registry = Arc::new(QuestRegistry::new(&config.data_dir));
    if let Err(e) = registry.load_all().await {
        error!("Failed to load quest registry: {}", e);
    }

    if config.hot_reload {
        match registry.start_file_watcher() {
            Ok(mut rx) => {
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        info!("Quest hot-reload: {:?}", event);
                    }
                });
            }
            Err(e) => warn!("Hot-reload disabled: {}", e),
        }
    }

    let Some(store) = open_store(&config).await else {
        return;
    };
    let bridge = ProgressSyncBridge::new(store, config.user_id.clone());
    let mut system = QuestSystem::new();

    let report = bridge.restore(&mut system, &registry).await;
    if report.fetch_failed {
        warn!("Starting without remote progress");
    }

    for quest_id in &config.starting_quests {
        if system.contains(quest_id) {
            continue;
        }
        match registry.get(quest_id).await {
            Some(definition) => {
                system.register(definition);
            }
            None => warn!("Starting quest {} is not defined", quest_id),
        }
    }

    let notifications = system.drain_notifications();
    notifications.iter().for_each(log_notification);
    bridge.mirror(&system, &notifications);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Input>(line) {
            Ok(Input::Event(event)) => system.dispatch(&event),
            Ok(Input::Command { command, quest_id }) => {
                let result = match command {
                    Command::Complete => system.complete(&quest_id).map(|_| ()),
                    Command::Cancel => system.cancel(&quest_id),
                };
                if let Err(e) = result {
                    warn!("{:?} rejected: {}", command, e);
                }
            }
            Err(e) => {
                warn!("Ignoring malformed input {:?}: {}", line, e);
                continue;
            }
        }

        let notifications = system.drain_notifications();
        notifications.iter().for_each(log_notification);
        bridge.mirror(&system, &notifications);
    }

    bridge.flush().await;
    info!(
        "Session ended: {} active, {} completed, {} canceled",
        system.active().count(),
        system.completed().count(),
        system.canceled().count()
    );
}
