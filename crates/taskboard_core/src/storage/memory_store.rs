use crate::error::AppError;
use crate::model::{ActionLogEntry, Task, TaskDraft, TaskStatus, User};
use crate::storage::{BoardState, RecordStore, WriteOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use time::OffsetDateTime;

/// In-process store. Every write holds the lock for the whole
/// compare-and-apply, which makes conditional writes atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<BoardState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn find_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.state.read().find_task(id).cloned())
    }

    fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        Ok(self.state.read().tasks.clone())
    }

    fn insert_task(&self, draft: TaskDraft) -> Result<Task, AppError> {
        Ok(self.state.write().insert_task(draft))
    }

    fn update_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
        edit: &mut dyn FnMut(&mut Task),
    ) -> Result<WriteOutcome, AppError> {
        Ok(self.state.write().update_task_if(id, expected, edit))
    }

    fn delete_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
    ) -> Result<WriteOutcome, AppError> {
        Ok(self.state.write().delete_task_if(id, expected))
    }

    fn count_tasks_by_assignee(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<HashMap<String, usize>, AppError> {
        Ok(self.state.read().count_tasks_by_assignee(statuses))
    }

    fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.state.read().find_user(id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.state.read().users.clone())
    }

    fn insert_user(&self, name: &str, email: &str) -> Result<User, AppError> {
        self.state.write().insert_user(name, email)
    }

    fn append_log(
        &self,
        actor: &str,
        action: &str,
        task: Option<&str>,
    ) -> Result<ActionLogEntry, AppError> {
        Ok(self.state.write().append_log(actor, action, task))
    }

    fn recent_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, AppError> {
        Ok(self.state.read().recent_logs(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::{TaskDraft, TaskStatus};
    use crate::storage::{RecordStore, WriteOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn only_one_of_two_racing_conditional_writes_lands() {
        let store = MemoryStore::new();
        let task = store.insert_task(TaskDraft::titled("race")).unwrap();
        let written = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for title in ["left", "right"] {
                let store = &store;
                let task = &task;
                let written = &written;
                scope.spawn(move || {
                    let outcome = store
                        .update_task_if(&task.id, Some(task.updated_at), &mut |task| {
                            task.title = title.to_string();
                        })
                        .unwrap();
                    if matches!(outcome, WriteOutcome::Written(_)) {
                        written.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(written.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn counts_only_requested_statuses() {
        let store = MemoryStore::new();
        let user = store.insert_user("Ada", "ada@example.com").unwrap();
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done] {
            store
                .insert_task(TaskDraft {
                    title: format!("{status}"),
                    assigned_user: Some(user.id.clone()),
                    status: Some(status),
                    ..TaskDraft::default()
                })
                .unwrap();
        }

        let counts = store.count_tasks_by_assignee(&TaskStatus::ACTIVE).unwrap();
        assert_eq!(counts.get(&user.id), Some(&2));
    }
}
