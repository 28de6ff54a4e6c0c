//! Remote progress records and the partial updates written for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Collection holding every quest record of a user
pub fn user_quests_path(user_id: &str) -> String {
    format!("users/{}/quests", user_id)
}

/// Path of one quest record
pub fn quest_path(user_id: &str, quest_id: &str) -> String {
    format!("users/{}/quests/{}", user_id, quest_id)
}

/// Quest state as mirrored remotely
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    #[default]
    Accepted,
    InProgress,
    Completed,
    Canceled,
}

/// Mirror of one quest instance, keyed by `(userId, questId)`.
///
/// Records are written field by field, so every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteProgressRecord {
    pub state: RemoteState,
    pub progress: u32,
    pub required: u32,
    pub task_index: usize,
    pub group_index: usize,
    /// Success of every task in the current group
    pub task_progress: Vec<u32>,
    pub reward_claimed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteProgressRecord {
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A partial record update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RemoteState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_progress: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_claimed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressPatch {
    /// Every field of a freshly accepted quest
    pub fn accepted(record: &RemoteProgressRecord) -> Self {
        Self {
            state: Some(RemoteState::Accepted),
            reward_claimed: Some(false),
            ..Self::progress(record)
        }
    }

    /// Progress fields plus `state: in_progress`
    pub fn in_progress(record: &RemoteProgressRecord) -> Self {
        Self {
            state: Some(RemoteState::InProgress),
            ..Self::progress(record)
        }
    }

    /// Final progress, claim flag and `state: completed`
    pub fn completed(record: &RemoteProgressRecord) -> Self {
        Self {
            state: Some(RemoteState::Completed),
            reward_claimed: Some(record.reward_claimed),
            ..Self::progress(record)
        }
    }

    /// Patch matching a full snapshot's state
    pub fn for_snapshot(record: &RemoteProgressRecord) -> Self {
        match record.state {
            RemoteState::Accepted => Self::accepted(record),
            RemoteState::InProgress => Self::in_progress(record),
            RemoteState::Completed => Self::completed(record),
            RemoteState::Canceled => Self::canceled(),
        }
    }

    /// Cancel touches nothing but the state
    pub fn canceled() -> Self {
        Self {
            state: Some(RemoteState::Canceled),
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    fn progress(record: &RemoteProgressRecord) -> Self {
        Self {
            progress: Some(record.progress),
            required: Some(record.required),
            task_index: Some(record.task_index),
            group_index: Some(record.group_index),
            task_progress: Some(record.task_progress.clone()),
            updated_at: Some(record.updated_at.unwrap_or_else(Utc::now)),
            ..Self::default()
        }
    }

    /// Field map for `ProgressStore::update`
    pub fn into_fields(self) -> Result<Map<String, Value>, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(StoreError::backend(format!(
                "progress patch serialized to non-object: {}",
                other
            ))),
        }
    }
}
