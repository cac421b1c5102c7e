pub mod audit;
pub mod balancer;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod storage;
pub mod task_api;

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::model::{ResolvedTask, Task, TaskPriority, TaskStatus, UserSummary};
    use time::macros::datetime;

    fn task() -> Task {
        Task {
            id: "task-1".to_string(),
            title: "demo".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assigned_user: Some("user-1".to_string()),
            created_at: datetime!(2025-12-20 00:00:00 UTC),
            updated_at: datetime!(2025-12-20 00:00:00.250 UTC),
        }
    }

    #[test]
    fn resolved_task_serializes_with_wire_field_names() {
        let assignee = UserSummary {
            id: "user-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };
        let value = serde_json::to_value(ResolvedTask::new(task(), Some(assignee))).unwrap();

        assert_eq!(value["assignedUser"]["name"], "Ada");
        assert_eq!(value["status"], "Todo");
        assert_eq!(value["priority"], "Medium");
        assert_eq!(value["createdAt"], "2025-12-20T00:00:00Z");
        assert!(
            value["updatedAt"]
                .as_str()
                .unwrap()
                .starts_with("2025-12-20T00:00:00.25")
        );
    }

    #[test]
    fn app_error_exposes_code_and_status() {
        let err = AppError::invalid_input("missing title");
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.to_string(), "invalid_input - missing title");

        let conflict = AppError::conflict(ResolvedTask::new(task(), None));
        assert_eq!(conflict.code(), "conflict");
        assert_eq!(conflict.http_status(), 409);
        assert_eq!(conflict.conflict_state().map(|task| task.id.as_str()), Some("task-1"));

        assert_eq!(AppError::store("disk full").http_status(), 500);
        assert_eq!(AppError::no_users_available("empty").http_status(), 400);
    }
}
