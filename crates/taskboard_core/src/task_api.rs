use crate::audit;
use crate::balancer::{self, Selection};
use crate::broadcast::{BoardEvent, Broadcaster};
use crate::error::AppError;
use crate::fingerprint::{ConcurrencyGuard, Verdict};
use crate::model::{
    ResolvedLogEntry, ResolvedTask, Task, TaskDraft, TaskPatch, TaskStatus, User, UserSummary,
};
use crate::storage::{RecordStore, WriteOutcome};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub message: String,
    pub id: String,
}

struct Guarded<P> {
    before: Task,
    after: Task,
    plan: P,
}

/// The only writer of task records.
///
/// Every mutation runs fingerprint check, conditional write, audit append
/// and broadcast, in that order. Nothing is logged or published unless the
/// task write committed.
pub struct TaskCoordinator<S, B> {
    store: S,
    broadcaster: B,
    active_statuses: Vec<TaskStatus>,
}

impl<S: RecordStore, B: Broadcaster> TaskCoordinator<S, B> {
    pub fn new(store: S, broadcaster: B) -> Self {
        Self {
            store,
            broadcaster,
            active_statuses: TaskStatus::ACTIVE.to_vec(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub fn register_user(&self, name: &str, email: &str) -> Result<User, AppError> {
        let user = self.store.insert_user(name, email)?;
        info!(user = %user.id, name = %user.name, "registered user");
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.store.list_users()
    }

    pub fn get_task(&self, id: &str) -> Result<ResolvedTask, AppError> {
        let task = self.load(required_id(id)?)?;
        self.resolve(task)
    }

    pub fn list_tasks(&self) -> Result<Vec<ResolvedTask>, AppError> {
        let users: HashMap<String, UserSummary> = self
            .store
            .list_users()?
            .into_iter()
            .map(|user| (user.id.clone(), user.summary()))
            .collect();

        Ok(self
            .store
            .list_tasks()?
            .into_iter()
            .map(|task| {
                let assignee = task
                    .assigned_user
                    .as_ref()
                    .and_then(|user_id| users.get(user_id).cloned());
                ResolvedTask::new(task, assignee)
            })
            .collect())
    }

    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ResolvedLogEntry>, AppError> {
        audit::recent(&self.store, limit)
    }

    pub fn create_task(&self, actor: &str, draft: TaskDraft) -> Result<ResolvedTask, AppError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }
        let actor = self.require_actor(actor)?;

        let assigned_user = match draft
            .assigned_user
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(user_id) => self.require_user(user_id)?.id,
            None => actor.id.clone(),
        };

        let task = self.store.insert_task(TaskDraft {
            title,
            assigned_user: Some(assigned_user),
            ..draft
        })?;
        info!(task = %task.id, actor = %actor.id, "created task");

        audit::record(&self.store, &actor.id, audit::CREATED, Some(&task.id));
        let resolved = self.resolve(task)?;
        self.publish(BoardEvent::TaskCreated(resolved.clone()));
        Ok(resolved)
    }

    pub fn update_task(
        &self,
        actor: &str,
        id: &str,
        mut patch: TaskPatch,
        guard: &ConcurrencyGuard,
    ) -> Result<ResolvedTask, AppError> {
        let id = required_id(id)?;
        patch.validate()?;
        let actor = self.require_actor(actor)?;
        let assignee = match patch.assigned_user.as_ref() {
            Some(Some(user_id)) => Some(self.require_user(user_id)?.id),
            _ => None,
        };
        if let Some(user_id) = assignee {
            patch.assigned_user = Some(Some(user_id));
        }

        let Guarded { before, after, .. } =
            self.write_guarded(id, guard, |_| Ok(()), |_, task| patch.apply_to(task))?;

        let action = audit::describe_update(&before, &after, guard.force);
        info!(task = %after.id, actor = %actor.id, action = %action, "updated task");

        audit::record(&self.store, &actor.id, &action, Some(&after.id));
        let resolved = self.resolve(after)?;
        self.publish(BoardEvent::TaskUpdated(resolved.clone()));
        Ok(resolved)
    }

    pub fn delete_task(
        &self,
        actor: &str,
        id: &str,
        guard: &ConcurrencyGuard,
    ) -> Result<Deletion, AppError> {
        let id = required_id(id)?;
        let actor = self.require_actor(actor)?;

        loop {
            let before = self.load_checked(id, guard)?;
            match self.store.delete_task_if(id, Some(before.updated_at))? {
                WriteOutcome::Written(removed) => {
                    let action = audit::describe_delete(&before.title, guard.force);
                    info!(task = %removed.id, actor = %actor.id, action = %action, "deleted task");

                    audit::record(&self.store, &actor.id, &action, Some(&removed.id));
                    self.publish(BoardEvent::TaskDeleted(removed.id.clone()));
                    return Ok(Deletion {
                        message: "Task deleted successfully".to_string(),
                        id: removed.id,
                    });
                }
                WriteOutcome::Missing => return Err(task_not_found()),
                WriteOutcome::Stale(current) => lost_race(&current),
            }
        }
    }

    pub fn smart_assign(
        &self,
        actor: &str,
        id: &str,
        guard: &ConcurrencyGuard,
    ) -> Result<ResolvedTask, AppError> {
        let id = required_id(id)?;
        let actor = self.require_actor(actor)?;

        let Guarded {
            after,
            plan: (selection, previous),
            ..
        } = self.write_guarded(
            id,
            guard,
            |current| {
                let selection = balancer::pick_assignee(&self.store, &self.active_statuses)?;
                let previous = match current.assigned_user.as_deref() {
                    Some(user_id) => self.store.find_user(user_id)?.map(|user| user.name),
                    None => None,
                };
                Ok((selection, previous))
            },
            |(selection, _): &(Selection, Option<String>), task| {
                task.assigned_user = Some(selection.user.id.clone());
            },
        )?;

        let action = audit::describe_smart_assign(previous.as_deref(), &selection, guard.force);
        info!(task = %after.id, actor = %actor.id, action = %action, "smart assigned task");

        audit::record(&self.store, &actor.id, &action, Some(&after.id));
        let resolved = self.resolve(after)?;
        self.publish(BoardEvent::TaskUpdated(resolved.clone()));
        Ok(resolved)
    }

    /// Check, plan and conditionally write, re-reading whenever another
    /// writer got in between the read and the write.
    ///
    /// A guarded write that loses the race conflicts on the re-read, since
    /// the winner advanced `updated_at`. Forced and unguarded writes go
    /// around again until they land.
    fn write_guarded<P>(
        &self,
        id: &str,
        guard: &ConcurrencyGuard,
        mut plan: impl FnMut(&Task) -> Result<P, AppError>,
        apply: impl Fn(&P, &mut Task),
    ) -> Result<Guarded<P>, AppError> {
        loop {
            let before = self.load_checked(id, guard)?;
            let prepared = plan(&before)?;
            let outcome = self.store.update_task_if(
                id,
                Some(before.updated_at),
                &mut |task: &mut Task| apply(&prepared, task),
            )?;

            match outcome {
                WriteOutcome::Written(after) => {
                    return Ok(Guarded {
                        before,
                        after,
                        plan: prepared,
                    });
                }
                WriteOutcome::Missing => return Err(task_not_found()),
                WriteOutcome::Stale(current) => lost_race(&current),
            }
        }
    }

    fn load_checked(&self, id: &str, guard: &ConcurrencyGuard) -> Result<Task, AppError> {
        let current = self.load(id)?;
        if guard.check(current.updated_at) == Verdict::Conflict {
            warn!(
                task = id,
                client = ?guard.client_updated_at,
                server = ?current.updated_at,
                "conflict detected"
            );
            return Err(AppError::conflict(self.resolve(current)?));
        }
        Ok(current)
    }

    fn load(&self, id: &str) -> Result<Task, AppError> {
        self.store.find_task(id)?.ok_or_else(task_not_found)
    }

    fn resolve(&self, task: Task) -> Result<ResolvedTask, AppError> {
        let assignee = match task.assigned_user.as_deref() {
            Some(user_id) => self.store.find_user(user_id)?.map(|user| user.summary()),
            None => None,
        };
        Ok(ResolvedTask::new(task, assignee))
    }

    fn require_actor(&self, actor: &str) -> Result<User, AppError> {
        self.store
            .find_user(actor.trim())?
            .ok_or_else(|| AppError::not_found("acting user not found"))
    }

    fn require_user(&self, user_id: &str) -> Result<User, AppError> {
        self.store
            .find_user(user_id.trim())?
            .ok_or_else(|| AppError::not_found("assigned user not found"))
    }

    fn publish(&self, event: BoardEvent) {
        if let Err(err) = self.broadcaster.publish(&event) {
            warn!(event = event.name(), task = event.task_id(), error = %err, "broadcast failed");
        }
    }
}

fn required_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed)
}

fn lost_race(current: &Task) {
    debug!(task = %current.id, updated_at = ?current.updated_at, "lost write race, re-reading");
}

fn task_not_found() -> AppError {
    AppError::not_found("Task not found")
}
