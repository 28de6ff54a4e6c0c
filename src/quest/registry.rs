//! Quest Registry
//!
//! Loads, caches, and serves quest definitions from TOML files.
//! Supports hot-reloading during development.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::definition::{QuestCategory, QuestDefinition, RawQuestFile};

/// Registry for all quest definitions
pub struct QuestRegistry {
    /// Loaded quest definitions
    quests: RwLock<HashMap<String, Arc<QuestDefinition>>>,
    /// Base directory for quest data
    data_dir: PathBuf,
}

impl QuestRegistry {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            quests: RwLock::new(HashMap::new()),
            data_dir: data_dir.join("quests"),
        }
    }

    /// Registry pre-filled with definitions built in code
    pub fn from_definitions(definitions: impl IntoIterator<Item = QuestDefinition>) -> Self {
        let quests = definitions
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        Self {
            quests: RwLock::new(quests),
            data_dir: PathBuf::new(),
        }
    }

    /// Load all quest definitions from the data directory
    pub async fn load_all(&self) -> Result<(), String> {
        info!("Loading quests from {:?}", self.data_dir);

        if !self.data_dir.exists() {
            warn!("Quest directory does not exist: {:?}", self.data_dir);
            return Ok(());
        }

        // Collect all TOML files first (sync), then load them (async)
        let mut paths = Vec::new();
        Self::collect_quest_files(&self.data_dir, &mut paths)?;
        paths.sort();

        let quest_count = self.load_quest_files(paths).await?;
        info!("Loaded {} quest definitions", quest_count);

        Ok(())
    }

    /// Recursively collect quest files (non-async to avoid boxing)
    fn collect_quest_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), String> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| format!("Failed to read directory {:?}: {}", dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let path = entry.path();

            if path.is_dir() {
                Self::collect_quest_files(&path, paths)?;
            } else if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }

        Ok(())
    }

    /// Parse every file, then swap the whole batch in under one lock
    async fn load_quest_files(&self, paths: Vec<PathBuf>) -> Result<usize, String> {
        let mut loaded: Vec<QuestDefinition> = Vec::new();
        let mut seen = HashSet::new();

        for path in paths {
            match Self::parse_quest_file(&path) {
                Ok(quest) => {
                    if !seen.insert(quest.id.clone()) {
                        warn!("Duplicate quest ID '{}' in {:?}, overwriting", quest.id, path);
                    }
                    info!("Loaded quest: {} ({})", quest.display_name, quest.id);
                    loaded.push(quest);
                }
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        // Replace the whole set so deleted files drop out on reload
        let fresh: HashMap<String, Arc<QuestDefinition>> = loaded
            .into_iter()
            .map(|quest| (quest.id.clone(), Arc::new(quest)))
            .collect();
        let count = fresh.len();
        *self.quests.write().await = fresh;
        Ok(count)
    }

    /// Parse a single quest file
    fn parse_quest_file(path: &Path) -> Result<QuestDefinition, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

        let raw: RawQuestFile = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

        QuestDefinition::from_raw(&raw.quest)
    }

    /// Add or replace a definition
    pub async fn insert(&self, definition: QuestDefinition) -> Arc<QuestDefinition> {
        let definition = Arc::new(definition);
        let mut quests = self.quests.write().await;
        quests.insert(definition.id.clone(), Arc::clone(&definition));
        definition
    }

    /// Get a quest by ID
    pub async fn get(&self, quest_id: &str) -> Option<Arc<QuestDefinition>> {
        let quests = self.quests.read().await;
        quests.get(quest_id).cloned()
    }

    /// Get all quest IDs
    pub async fn all_ids(&self) -> Vec<String> {
        let quests = self.quests.read().await;
        quests.keys().cloned().collect()
    }

    /// Get quests in a quest-log category
    pub async fn by_category(&self, category: QuestCategory) -> Vec<Arc<QuestDefinition>> {
        let quests = self.quests.read().await;
        quests
            .values()
            .filter(|q| q.category == category)
            .cloned()
            .collect()
    }

    /// Get count of loaded quests
    pub async fn count(&self) -> usize {
        self.quests.read().await.len()
    }

    /// Start file watcher for hot-reload
    /// Returns a channel receiver that signals when reloads occur
    pub fn start_file_watcher(
        self: &Arc<Self>,
    ) -> Result<tokio::sync::mpsc::Receiver<HotReloadEvent>, String> {
        use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
        use std::time::Duration;

        if !self.data_dir.exists() {
            return Err(format!("Quest directory does not exist: {:?}", self.data_dir));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let registry = Arc::clone(self);
        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| format!("File watcher needs a Tokio runtime: {}", e))?;
        let data_dir = self.data_dir.clone();

        // notify is sync; it gets its own thread
        std::thread::spawn(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = match RecommendedWatcher::new(
                move |res: Result<notify::Event, notify::Error>| {
                    if let Ok(event) = res {
                        let _ = notify_tx.send(event);
                    }
                },
                Config::default().with_poll_interval(Duration::from_secs(1)),
            ) {
                Ok(w) => w,
                Err(e) => {
                    tracing::error!("Failed to create file watcher: {}", e);
                    return;
                }
            };

            if let Err(e) = watcher.watch(&data_dir, RecursiveMode::Recursive) {
                tracing::error!("Failed to watch quest directory: {}", e);
                return;
            }

            info!("Quest hot-reload watcher started for {:?}", data_dir);

            // Ends when the watcher's sender goes away
            while let Ok(event) = notify_rx.recv() {
                if !matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    continue;
                }
                for path in event.paths {
                    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                        continue;
                    }
                    info!("Detected change in {:?}, triggering reload", path);

                    let reg = Arc::clone(&registry);
                    let tx = tx.clone();
                    rt.spawn(async move {
                        let event = match reg.load_all().await {
                            Ok(()) => HotReloadEvent::Reloaded(path.to_string_lossy().to_string()),
                            Err(e) => {
                                tracing::error!("Hot-reload failed: {}", e);
                                HotReloadEvent::Error(e)
                            }
                        };
                        let _ = tx.send(event).await;
                    });
                }
            }
        });

        Ok(rx)
    }
}

/// Events from the hot-reload watcher
#[derive(Debug, Clone)]
pub enum HotReloadEvent {
    /// A file was reloaded successfully
    Reloaded(String),
    /// An error occurred during reload
    Error(String),
}
