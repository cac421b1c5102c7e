use crate::error::AppError;
use crate::model::UserSummary;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Todo")]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    /// Statuses that count toward a user's load.
    pub const ACTIVE: [TaskStatus; 2] = [TaskStatus::Todo, TaskStatus::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match fold_name(raw).as_str() {
            "todo" => Ok(Self::Todo),
            "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(AppError::invalid_input(format!("unknown status '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match fold_name(raw).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(AppError::invalid_input(format!("unknown priority '{raw}'"))),
        }
    }
}

fn fold_name(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// A task as persisted by the record store. `assigned_user` is a user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assigned_user: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A task with its assignment joined to the assignee's display fields.
///
/// This is the shape returned to callers and carried by broadcast events. An
/// assignment that no longer resolves is reported as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_user: Option<UserSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ResolvedTask {
    pub fn new(task: Task, assigned_user: Option<UserSummary>) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            assigned_user,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Input for task creation. Missing status and priority fall back to their
/// defaults when the task is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_user: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
}

impl TaskDraft {
    pub fn titled<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Sparse update. `None` leaves a field untouched; for the nullable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub assigned_user: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = self.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(AppError::invalid_input("title is required"));
        }
        Ok(())
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = self.title.as_deref() {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description.as_ref() {
            task.description = description.clone();
        }
        if let Some(assigned_user) = self.assigned_user.as_ref() {
            task.assigned_user = assigned_user.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}

// An explicit `null` must survive as `Some(None)` rather than collapse into
// "field absent".
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{TaskPatch, TaskPriority, TaskStatus};

    #[test]
    fn status_uses_display_names_on_the_wire() {
        let encoded = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(encoded, "\"In Progress\"");

        let decoded: TaskStatus = serde_json::from_str("\"Done\"").unwrap();
        assert_eq!(decoded, TaskStatus::Done);
    }

    #[test]
    fn status_parses_loose_spellings() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("TODO".parse::<TaskStatus>().unwrap(), TaskStatus::Todo);
        assert_eq!("blocked".parse::<TaskStatus>().unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn only_todo_and_in_progress_are_active() {
        assert!(TaskStatus::Todo.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(!TaskStatus::Done.is_active());
    }

    #[test]
    fn defaults_are_todo_and_medium() {
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: TaskPatch =
            serde_json::from_str(r#"{"description": null, "status": "Done"}"#).unwrap();

        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.assigned_user, None);
        assert_eq!(patch.title, None);
        assert_eq!(patch.status, Some(TaskStatus::Done));
    }

    #[test]
    fn patch_rejects_blank_title() {
        let patch = TaskPatch {
            title: Some("   ".to_string()),
            ..TaskPatch::default()
        };

        assert_eq!(patch.validate().unwrap_err().code(), "invalid_input");
    }
}
