use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    dates::DueState,
    models::{
        assignee::TaskAssignee,
        task::{Priority, Task, TaskStatus},
    },
};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Default)]
pub struct TaskListQuery {
    pub category_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub due_date: Option<String>,
    pub category_id: Option<i64>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Todo
}

fn default_priority() -> Priority {
    Priority::Medium
}

#[derive(Deserialize, Default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
}

/// Drop target on the board. `category_id: null` is the uncategorised column.
#[derive(Deserialize)]
pub struct MoveTaskRequest {
    pub category_id: Option<i64>,
    pub index: usize,
}

#[derive(Serialize, Default, Clone, Copy)]
pub struct SubtaskSummary {
    pub total: i64,
    pub completed: i64,
}

/// A task as rendered on the board.
#[derive(Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub priority_color: &'static str,
    pub due_state: DueState,
    pub due_label: Option<String>,
    pub assignees: Vec<TaskAssignee>,
    pub subtasks: SubtaskSummary,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: TaskView,
}

#[derive(Serialize)]
pub struct TaskListResponse {
    pub success: bool,
    pub tasks: Vec<TaskView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_missing() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"due_date": null, "title": "Ship it"}"#).unwrap();
        assert_eq!(req.due_date, Some(None));
        assert_eq!(req.category_id, None);
        assert_eq!(req.description, None);
        assert_eq!(req.title.as_deref(), Some("Ship it"));
    }

    #[test]
    fn create_defaults_status_and_priority() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title": "Write docs"}"#).unwrap();
        assert_eq!(req.status, TaskStatus::Todo);
        assert_eq!(req.priority, Priority::Medium);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let req = serde_json::from_str::<CreateTaskRequest>(r#"{"title": "x", "status": "blocked"}"#);
        assert!(req.is_err());
    }
}
