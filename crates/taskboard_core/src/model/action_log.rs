use crate::model::UserSummary;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One audit record. `task` is a weak reference and may outlive the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub id: String,
    pub user: String,
    pub action: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
}

/// An audit record joined with display fields for its actor and task.
///
/// `user` and `task` are `None` when the referenced record is gone; `task_id`
/// keeps the raw reference either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLogEntry {
    pub id: String,
    pub action: String,
    pub user: Option<UserSummary>,
    pub task: Option<TaskSummary>,
    pub task_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
