mod action_log;
mod task;
mod user;

pub use action_log::{ActionLogEntry, ResolvedLogEntry, TaskSummary};
pub use task::{ResolvedTask, Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};
pub use user::{User, UserSummary};
