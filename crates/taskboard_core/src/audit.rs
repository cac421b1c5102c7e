//! Audit trail: action wording and the best-effort append/read paths.

use crate::balancer::Selection;
use crate::error::AppError;
use crate::model::{ActionLogEntry, ResolvedLogEntry, Task, TaskSummary, UserSummary};
use crate::storage::RecordStore;
use std::collections::HashMap;
use tracing::warn;

/// Upper bound on entries returned by [`recent`].
pub const RECENT_LIMIT: usize = 20;

pub const CREATED: &str = "Created Task";
const FORCED_SUFFIX: &str = " [FORCED]";
const UNASSIGNED: &str = "Unassigned";

pub fn describe_update(before: &Task, after: &Task, forced: bool) -> String {
    let mut changes = Vec::new();

    if before.title != after.title {
        changes.push(change_clause("title", &before.title, &after.title));
    }
    if before.description != after.description {
        changes.push(change_clause(
            "description",
            before.description.as_deref().unwrap_or(""),
            after.description.as_deref().unwrap_or(""),
        ));
    }
    if before.status != after.status {
        changes.push(change_clause(
            "status",
            before.status.as_str(),
            after.status.as_str(),
        ));
    }
    if before.priority != after.priority {
        changes.push(change_clause(
            "priority",
            before.priority.as_str(),
            after.priority.as_str(),
        ));
    }
    if before.assigned_user != after.assigned_user {
        changes.push(change_clause(
            "assignedUser",
            before.assigned_user.as_deref().unwrap_or(UNASSIGNED),
            after.assigned_user.as_deref().unwrap_or(UNASSIGNED),
        ));
    }

    let base = if changes.is_empty() {
        "Updated Task".to_string()
    } else {
        format!("Updated Task ({})", changes.join(", "))
    };
    with_force(base, forced)
}

pub fn describe_delete(title: &str, forced: bool) -> String {
    with_force(format!("Deleted Task \"{title}\""), forced)
}

/// `previous` is the display name of the assignee being replaced.
pub fn describe_smart_assign(previous: Option<&str>, selection: &Selection, forced: bool) -> String {
    with_force(
        format!(
            "Smart Assigned task from {} to {} ({} active tasks)",
            previous.unwrap_or(UNASSIGNED),
            selection.user.name,
            selection.active_tasks
        ),
        forced,
    )
}

fn change_clause(field: &str, old: &str, new: &str) -> String {
    format!("{field}: \"{old}\" → \"{new}\"")
}

fn with_force(description: String, forced: bool) -> String {
    if forced {
        format!("{description}{FORCED_SUFFIX}")
    } else {
        description
    }
}

/// Appends an entry. The task write this describes has already committed, so
/// a failure here is logged and swallowed rather than failing the mutation.
pub fn record(
    store: &dyn RecordStore,
    actor: &str,
    action: &str,
    task: Option<&str>,
) -> Option<ActionLogEntry> {
    match store.append_log(actor, action, task) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(actor, action, task, error = %err, "failed to append audit entry");
            None
        }
    }
}

/// Newest entries first, at most `min(limit, RECENT_LIMIT)`, with actor and
/// task display fields joined in. Dangling references resolve to `None`.
pub fn recent(store: &dyn RecordStore, limit: usize) -> Result<Vec<ResolvedLogEntry>, AppError> {
    let entries = store.recent_logs(limit.min(RECENT_LIMIT))?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let users: HashMap<String, UserSummary> = store
        .list_users()?
        .into_iter()
        .map(|user| (user.id.clone(), user.summary()))
        .collect();
    let tasks: HashMap<String, String> = store
        .list_tasks()?
        .into_iter()
        .map(|task| (task.id, task.title))
        .collect();

    Ok(entries
        .into_iter()
        .map(|entry| {
            let task = entry.task.as_ref().and_then(|id| {
                tasks.get(id).map(|title| TaskSummary {
                    id: id.clone(),
                    title: title.clone(),
                })
            });
            ResolvedLogEntry {
                user: users.get(&entry.user).cloned(),
                task,
                task_id: entry.task,
                id: entry.id,
                action: entry.action,
                created_at: entry.created_at,
            }
        })
        .collect())
}
