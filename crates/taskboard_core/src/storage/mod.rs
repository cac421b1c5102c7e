//! Record store seam.
//!
//! The store owns task, user and audit records, assigns ids and timestamps,
//! and offers writes that are conditional on the `updated_at` the caller
//! observed, so a check-then-write cannot be interleaved by another writer.

pub mod json_store;
pub mod memory_store;

pub use json_store::JsonStore;
pub use memory_store::MemoryStore;

use crate::error::AppError;
use crate::fingerprint::same_instant;
use crate::model::{ActionLogEntry, Task, TaskDraft, TaskStatus, User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Result of a conditional task write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write happened; carries the task as it now is (or was, for a delete).
    Written(Task),
    Missing,
    /// `updated_at` moved since the caller looked; carries the current task.
    Stale(Task),
}

pub trait RecordStore: Send + Sync {
    fn find_task(&self, id: &str) -> Result<Option<Task>, AppError>;

    fn list_tasks(&self) -> Result<Vec<Task>, AppError>;

    fn insert_task(&self, draft: TaskDraft) -> Result<Task, AppError>;

    /// Applies `edit` and advances `updated_at`, but only if the stored
    /// `updated_at` still equals `expected` (when given).
    fn update_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
        edit: &mut dyn FnMut(&mut Task),
    ) -> Result<WriteOutcome, AppError>;

    fn delete_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
    ) -> Result<WriteOutcome, AppError>;

    /// Number of tasks per assignee whose status is in `statuses`.
    fn count_tasks_by_assignee(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<HashMap<String, usize>, AppError>;

    fn find_user(&self, id: &str) -> Result<Option<User>, AppError>;

    /// All users in registration order.
    fn list_users(&self) -> Result<Vec<User>, AppError>;

    fn insert_user(&self, name: &str, email: &str) -> Result<User, AppError>;

    fn append_log(
        &self,
        actor: &str,
        action: &str,
        task: Option<&str>,
    ) -> Result<ActionLogEntry, AppError>;

    /// Newest first, at most `limit` entries.
    fn recent_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, AppError>;
}

/// The full contents of a board. Both stores keep one of these, in memory
/// or on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub action_logs: Vec<ActionLogEntry>,
}

impl BoardState {
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn find_user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn insert_task(&mut self, draft: TaskDraft) -> Task {
        let now = next_timestamp(None);
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            status: draft.status.unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            assigned_user: draft.assigned_user,
            created_at: now,
            updated_at: now,
        };
        self.tasks.push(task.clone());
        task
    }

    pub fn update_task_if(
        &mut self,
        id: &str,
        expected: Option<OffsetDateTime>,
        edit: &mut dyn FnMut(&mut Task),
    ) -> WriteOutcome {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return WriteOutcome::Missing;
        };

        if let Some(expected) = expected
            && !same_instant(task.updated_at, expected)
        {
            return WriteOutcome::Stale(task.clone());
        }

        let previous = task.updated_at;
        edit(task);
        task.id = id.to_string();
        task.updated_at = next_timestamp(Some(previous));
        WriteOutcome::Written(task.clone())
    }

    pub fn delete_task_if(&mut self, id: &str, expected: Option<OffsetDateTime>) -> WriteOutcome {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return WriteOutcome::Missing;
        };

        if let Some(expected) = expected
            && !same_instant(self.tasks[index].updated_at, expected)
        {
            return WriteOutcome::Stale(self.tasks[index].clone());
        }

        WriteOutcome::Written(self.tasks.remove(index))
    }

    pub fn count_tasks_by_assignee(&self, statuses: &[TaskStatus]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for task in &self.tasks {
            if !statuses.contains(&task.status) {
                continue;
            }
            if let Some(user_id) = task.assigned_user.as_deref() {
                *counts.entry(user_id.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn insert_user(&mut self, name: &str, email: &str) -> Result<User, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("name is required"));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::invalid_input("email is required"));
        }
        if self
            .users
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(email))
        {
            return Err(AppError::invalid_input("email is already registered"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: next_timestamp(None),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn append_log(&mut self, actor: &str, action: &str, task: Option<&str>) -> ActionLogEntry {
        let previous = self.action_logs.last().map(|entry| entry.created_at);
        let entry = ActionLogEntry {
            id: Uuid::new_v4().to_string(),
            user: actor.to_string(),
            action: action.to_string(),
            task: task.map(str::to_string),
            created_at: next_timestamp(previous),
        };
        self.action_logs.push(entry.clone());
        entry
    }

    pub fn recent_logs(&self, limit: usize) -> Vec<ActionLogEntry> {
        self.action_logs.iter().rev().take(limit).cloned().collect()
    }
}

/// Current UTC time at millisecond resolution, strictly after `previous`.
pub fn next_timestamp(previous: Option<OffsetDateTime>) -> OffsetDateTime {
    let now = truncate_to_millis(OffsetDateTime::now_utc());
    match previous {
        Some(previous) if now <= previous => truncate_to_millis(previous) + Duration::milliseconds(1),
        _ => now,
    }
}

pub fn truncate_to_millis(value: OffsetDateTime) -> OffsetDateTime {
    let sub_millis = i64::from(value.nanosecond() % 1_000_000);
    value - Duration::nanoseconds(sub_millis)
}
