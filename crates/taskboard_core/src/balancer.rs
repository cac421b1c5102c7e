//! Least-loaded assignee selection.

use crate::error::AppError;
use crate::model::{TaskStatus, User};
use crate::storage::RecordStore;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub user: User,
    /// Active tasks the user held when selected, before the new assignment.
    pub active_tasks: usize,
}

/// Picks the user with the strictly smallest load. Ties go to whoever comes
/// first in `users`; users absent from `loads` carry no load.
pub fn select_least_loaded(users: &[User], loads: &HashMap<String, usize>) -> Option<Selection> {
    let mut selected: Option<Selection> = None;

    for user in users {
        let count = loads.get(&user.id).copied().unwrap_or(0);
        let better = match selected.as_ref() {
            Some(current) => count < current.active_tasks,
            None => true,
        };
        if better {
            selected = Some(Selection {
                user: user.clone(),
                active_tasks: count,
            });
        }
    }

    selected
}

/// Loads the roster and the per-user load in one grouped count, then picks.
pub fn pick_assignee(
    store: &dyn RecordStore,
    active_statuses: &[TaskStatus],
) -> Result<Selection, AppError> {
    let users = store.list_users()?;
    if users.is_empty() {
        return Err(AppError::no_users_available("No users found for assignment"));
    }

    let loads = store.count_tasks_by_assignee(active_statuses)?;
    debug!(users = users.len(), ?loads, "computed assignment load");

    select_least_loaded(&users, &loads)
        .ok_or_else(|| AppError::no_users_available("No suitable user found for assignment"))
}

#[cfg(test)]
mod tests {
    use super::{pick_assignee, select_least_loaded};
    use crate::model::{TaskDraft, TaskStatus, User};
    use crate::storage::{MemoryStore, RecordStore};
    use std::collections::HashMap;
    use time::macros::datetime;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: format!("{id}@example.com"),
            created_at: datetime!(2025-12-01 00:00:00 UTC),
        }
    }

    #[test]
    fn picks_the_strict_minimum() {
        let users = vec![user("u1"), user("u2"), user("u3")];
        let loads: HashMap<String, usize> =
            [("u1".to_string(), 2), ("u2".to_string(), 0), ("u3".to_string(), 1)]
                .into_iter()
                .collect();

        let selection = select_least_loaded(&users, &loads).unwrap();
        assert_eq!(selection.user.id, "u2");
        assert_eq!(selection.active_tasks, 0);
    }

    #[test]
    fn ties_go_to_the_first_in_roster_order() {
        let users = vec![user("zed"), user("amy"), user("bob")];

        let selection = select_least_loaded(&users, &HashMap::new()).unwrap();
        assert_eq!(selection.user.id, "zed");
    }

    #[test]
    fn later_equal_load_does_not_replace_earlier() {
        let users = vec![user("u1"), user("u2"), user("u3")];
        let loads: HashMap<String, usize> =
            [("u1".to_string(), 3), ("u2".to_string(), 1), ("u3".to_string(), 1)]
                .into_iter()
                .collect();

        let selection = select_least_loaded(&users, &loads).unwrap();
        assert_eq!(selection.user.id, "u2");
        assert_eq!(selection.active_tasks, 1);
    }

    #[test]
    fn empty_roster_selects_nobody() {
        assert!(select_least_loaded(&[], &HashMap::new()).is_none());
    }

    #[test]
    fn pick_assignee_reports_empty_roster() {
        let store = MemoryStore::new();
        let err = pick_assignee(&store, &TaskStatus::ACTIVE).unwrap_err();

        assert_eq!(err.code(), "no_users_available");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn pick_assignee_ignores_done_tasks() {
        let store = MemoryStore::new();
        let busy = store.insert_user("Busy", "busy@example.com").unwrap();
        let idle = store.insert_user("Idle", "idle@example.com").unwrap();

        store
            .insert_task(TaskDraft {
                title: "open".to_string(),
                assigned_user: Some(busy.id.clone()),
                ..TaskDraft::default()
            })
            .unwrap();
        for title in ["shipped", "also shipped"] {
            store
                .insert_task(TaskDraft {
                    title: title.to_string(),
                    assigned_user: Some(idle.id.clone()),
                    status: Some(TaskStatus::Done),
                    ..TaskDraft::default()
                })
                .unwrap();
        }

        let selection = pick_assignee(&store, &TaskStatus::ACTIVE).unwrap();
        assert_eq!(selection.user.id, idle.id);
        assert_eq!(selection.active_tasks, 0);
    }
}
