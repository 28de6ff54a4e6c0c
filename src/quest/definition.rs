//! Quest Definition Structures
//!
//! Authored quest templates. Raw structures are deserialized from TOML
//! quest files and resolved into immutable [`QuestDefinition`]s; the
//! builder offers the same result from code.

use serde::{Deserialize, Serialize};

use super::action::{ActionKind, TaskAction};
use super::target::TaskTarget;

/// A quest definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub auto_complete: bool,
    #[serde(default = "default_true")]
    pub cancelable: bool,
    #[serde(default = "default_true")]
    pub savable: bool,
    /// Ordered task groups
    #[serde(default)]
    pub groups: Vec<RawTaskGroup>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskGroup {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

/// Raw task as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub action: String,
    /// Threshold for survive tasks
    pub seconds: Option<u32>,
    /// Defaults to 1, or to `seconds` for survive tasks
    pub required: Option<u32>,
    #[serde(default)]
    pub targets: Vec<TaskTarget>,
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Quest log category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestCategory {
    #[default]
    Main,
    Side,
    Daily,
    Achievement,
}

impl QuestCategory {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "main" | "story" => Some(QuestCategory::Main),
            "side" => Some(QuestCategory::Side),
            "daily" => Some(QuestCategory::Daily),
            "achievement" => Some(QuestCategory::Achievement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestCategory::Main => "main",
            QuestCategory::Side => "side",
            QuestCategory::Daily => "daily",
            QuestCategory::Achievement => "achievement",
        }
    }
}

/// A single reward entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reward {
    Exp { amount: u32 },
    Gold { amount: u32 },
    Item {
        id: String,
        #[serde(default = "default_item_count")]
        count: u32,
    },
}

fn default_item_count() -> u32 {
    1
}

/// Authored task: one action, one or more targets and a success threshold
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTemplate {
    pub action: TaskAction,
    pub targets: Vec<TaskTarget>,
    pub required: u32,
    pub description: String,
}

impl TaskTemplate {
    /// Create a task whose threshold follows from its action: 1 for
    /// triggers, the time threshold for survival, `required` otherwise.
    pub fn new(action: TaskAction, required: u32) -> Self {
        let required = match action.kind() {
            ActionKind::Accumulate => required,
            ActionKind::Trigger => 1,
            ActionKind::Threshold => action.threshold().unwrap_or(required),
        };
        Self {
            action,
            targets: Vec::new(),
            required,
            description: String::new(),
        }
    }

    pub fn target(mut self, target: TaskTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_raw(raw: &RawTask) -> Result<Self, String> {
        let action = TaskAction::from_str(&raw.action, raw.seconds)
            .ok_or_else(|| format!("Invalid task action '{}'", raw.action))?;
        let default_required = match action.kind() {
            ActionKind::Threshold => action.threshold().unwrap_or(1),
            _ => 1,
        };

        Ok(Self {
            action,
            targets: raw.targets.clone(),
            required: raw.required.unwrap_or(default_required),
            description: raw.description.clone(),
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.required == 0 {
            return Err("required must be at least 1".to_string());
        }
        if self.targets.is_empty() {
            return Err("task has no targets".to_string());
        }
        match self.action.kind() {
            ActionKind::Trigger if self.required != 1 => {
                Err(format!("{} tasks must have required = 1", self.action.as_str()))
            }
            ActionKind::Threshold if self.action.threshold() != Some(self.required) => {
                Err("survive tasks must require exactly their threshold".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Tasks that must all complete before the quest advances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskGroupTemplate {
    pub tasks: Vec<TaskTemplate>,
}

impl TaskGroupTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: TaskTemplate) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A fully resolved, immutable quest definition
#[derive(Debug, Clone, PartialEq)]
pub struct QuestDefinition {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub category: QuestCategory,
    pub groups: Vec<TaskGroupTemplate>,
    pub rewards: Vec<Reward>,
    /// Complete as soon as the last group is done, without a turn-in
    pub auto_complete: bool,
    pub cancelable: bool,
    /// Mirror progress to the remote store
    pub savable: bool,
}

impl QuestDefinition {
    pub fn builder(id: impl Into<String>) -> QuestDefinitionBuilder {
        QuestDefinitionBuilder::new(id)
    }

    /// Create a QuestDefinition from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, String> {
        let category = match raw.category.as_deref() {
            Some(name) => QuestCategory::from_str(name)
                .ok_or_else(|| format!("Invalid quest category '{}'", name))?,
            None => QuestCategory::default(),
        };

        let groups = raw
            .groups
            .iter()
            .enumerate()
            .map(|(g, group)| {
                let tasks = group
                    .tasks
                    .iter()
                    .enumerate()
                    .map(|(t, task)| {
                        TaskTemplate::from_raw(task)
                            .map_err(|e| format!("{} (group {}, task {})", e, g, t))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TaskGroupTemplate { tasks })
            })
            .collect::<Result<Vec<_>, String>>()?;

        let definition = Self {
            id: raw.id.clone(),
            display_name: raw.display_name.clone(),
            description: raw.description.clone(),
            category,
            groups,
            rewards: raw.rewards.clone(),
            auto_complete: raw.auto_complete,
            cancelable: raw.cancelable,
            savable: raw.savable,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Check authoring constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Quest id is empty".to_string());
        }
        if self.groups.is_empty() {
            return Err(format!("Quest '{}' has no task groups", self.id));
        }
        for (g, group) in self.groups.iter().enumerate() {
            if group.tasks.is_empty() {
                return Err(format!("Quest '{}' group {} has no tasks", self.id, g));
            }
            for (t, task) in group.tasks.iter().enumerate() {
                task.validate()
                    .map_err(|e| format!("Quest '{}' group {} task {}: {}", self.id, g, t, e))?;
            }
        }
        Ok(())
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn task_count(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }
}

/// Builder for quests authored in code
#[derive(Debug, Clone)]
pub struct QuestDefinitionBuilder {
    definition: QuestDefinition,
}

impl QuestDefinitionBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            definition: QuestDefinition {
                display_name: id.clone(),
                id,
                description: String::new(),
                category: QuestCategory::default(),
                groups: Vec::new(),
                rewards: Vec::new(),
                auto_complete: true,
                cancelable: true,
                savable: true,
            },
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.definition.display_name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    pub fn category(mut self, category: QuestCategory) -> Self {
        self.definition.category = category;
        self
    }

    pub fn group(mut self, group: TaskGroupTemplate) -> Self {
        self.definition.groups.push(group);
        self
    }

    /// Shorthand for a group holding a single task
    pub fn task(self, task: TaskTemplate) -> Self {
        self.group(TaskGroupTemplate::new().task(task))
    }

    pub fn reward(mut self, reward: Reward) -> Self {
        self.definition.rewards.push(reward);
        self
    }

    pub fn auto_complete(mut self, auto_complete: bool) -> Self {
        self.definition.auto_complete = auto_complete;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.definition.cancelable = cancelable;
        self
    }

    pub fn savable(mut self, savable: bool) -> Self {
        self.definition.savable = savable;
        self
    }

    pub fn build(self) -> Result<QuestDefinition, String> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}
