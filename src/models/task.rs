use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySql, MySqlConnection, MySqlExecutor, MySqlPool, QueryBuilder};

use super::string_enum;

string_enum! {
    pub enum TaskStatus {
        Todo => "todo",
        InProgress => "in_progress",
        Done => "done",
    }
}

string_enum! {
    pub enum Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl Priority {
    /// Badge color used on task cards.
    pub fn color(self) -> &'static str {
        match self {
            Priority::Low => "#9CA3AF",
            Priority::Medium => "#3B82F6",
            Priority::High => "#F59E0B",
            Priority::Urgent => "#EF4444",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub task_id: i64,
    pub workspace_id: i64,
    pub category_id: Option<i64>,
    pub parent_task_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub position: i32,
    pub created_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewTask<'a> {
    pub workspace_id: i64,
    pub category_id: Option<i64>,
    pub parent_task_id: Option<i64>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_by: i64,
}

/// Partial update. `Some(None)` clears a nullable field.
#[derive(Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub category_id: Option<Option<i64>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category_id.is_none()
    }

    /// Applies the changes and reports which fields actually changed.
    /// Entering `done` stamps `completed_at`; leaving it clears the stamp.
    pub fn apply(self, task: &mut Task, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(title) = self.title {
            if title != task.title {
                task.title = title;
                changed.push("title");
            }
        }
        if let Some(description) = self.description {
            if description != task.description {
                task.description = description;
                changed.push("description");
            }
        }
        if let Some(priority) = self.priority {
            if priority != task.priority {
                task.priority = priority;
                changed.push("priority");
            }
        }
        if let Some(due_date) = self.due_date {
            if due_date != task.due_date {
                task.due_date = due_date;
                changed.push("due_date");
            }
        }
        if let Some(category_id) = self.category_id {
            if category_id != task.category_id {
                task.category_id = category_id;
                changed.push("category_id");
            }
        }
        if let Some(status) = self.status {
            if status != task.status {
                task.completed_at = match status {
                    TaskStatus::Done => Some(now),
                    _ => None,
                };
                task.status = status;
                changed.push("status");
            }
        }
        if !changed.is_empty() {
            task.updated_at = now;
        }
        changed
    }
}

#[derive(Debug, Default)]
pub struct TaskFilter {
    pub category_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<i64>,
    /// `None` lists top-level tasks only.
    pub parent_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct SubtaskCount {
    pub parent_task_id: i64,
    pub total: i64,
    pub completed: i64,
}

const TASK_COLUMNS: &str = "t.task_id, t.workspace_id, t.category_id, t.parent_task_id, t.title, \
                            t.description, t.status, t.priority, t.due_date, t.position, \
                            t.created_by, t.completed_at, t.created_at, t.updated_at";

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        task_id: i64,
    ) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks t WHERE t.workspace_id = ? AND t.task_id = ?",
            TASK_COLUMNS
        ))
        .bind(workspace_id)
        .bind(task_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(
        pool: &MySqlPool,
        workspace_id: i64,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let mut query: QueryBuilder<MySql> =
            QueryBuilder::new(format!("SELECT {} FROM tasks t", TASK_COLUMNS));

        if let Some(assignee_id) = filter.assignee_id {
            query
                .push(" JOIN task_assignees a ON a.task_id = t.task_id AND a.user_id = ")
                .push_bind(assignee_id);
        }
        query.push(" WHERE t.workspace_id = ").push_bind(workspace_id);

        match filter.parent_id {
            Some(parent_id) => {
                query.push(" AND t.parent_task_id = ").push_bind(parent_id);
            }
            None => {
                query.push(" AND t.parent_task_id IS NULL");
            }
        }
        if let Some(category_id) = filter.category_id {
            query.push(" AND t.category_id = ").push_bind(category_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            query
                .push(" AND t.title LIKE ")
                .push_bind(format!("%{}%", escape_like(search)));
        }
        query.push(" ORDER BY t.category_id IS NULL, t.category_id, t.position, t.task_id");

        query.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn create(conn: &mut MySqlConnection, task: NewTask<'_>) -> Result<i64, sqlx::Error> {
        let position = Self::next_position(&mut *conn, task.workspace_id, task.category_id, task.parent_task_id).await?;
        let now = Utc::now();
        let completed_at = (task.status == TaskStatus::Done).then_some(now);

        let result = sqlx::query(
            "INSERT INTO tasks \
             (workspace_id, category_id, parent_task_id, title, description, status, priority, \
              due_date, position, created_by, completed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.workspace_id)
        .bind(task.category_id)
        .bind(task.parent_task_id)
        .bind(task.title)
        .bind(task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(position)
        .bind(task.created_by)
        .bind(completed_at)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    /// Writes every mutable field back.
    pub async fn save<'e, E: MySqlExecutor<'e>>(executor: E, task: &Task) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET category_id = ?, title = ?, description = ?, status = ?, priority = ?, \
             due_date = ?, position = ?, completed_at = ?, updated_at = ? WHERE task_id = ?",
        )
        .bind(task.category_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.position)
        .bind(task.completed_at)
        .bind(task.updated_at)
        .bind(task.task_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E: MySqlExecutor<'e>>(executor: E, task_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    async fn next_position(
        conn: &mut MySqlConnection,
        workspace_id: i64,
        category_id: Option<i64>,
        parent_task_id: Option<i64>,
    ) -> Result<i32, sqlx::Error> {
        let next: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(MAX(position) + 1, 0) AS SIGNED) FROM tasks \
             WHERE workspace_id = ? AND category_id <=> ? AND parent_task_id <=> ?",
        )
        .bind(workspace_id)
        .bind(category_id)
        .bind(parent_task_id)
        .fetch_one(conn)
        .await?;
        Ok(next as i32)
    }

    /// Ids of the top-level tasks in one board column, locked for reordering.
    pub async fn column_ids_for_update(
        conn: &mut MySqlConnection,
        workspace_id: i64,
        category_id: Option<i64>,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT task_id FROM tasks \
             WHERE workspace_id = ? AND category_id <=> ? AND parent_task_id IS NULL \
             ORDER BY position, task_id FOR UPDATE",
        )
        .bind(workspace_id)
        .bind(category_id)
        .fetch_all(conn)
        .await
    }

    /// Rewrites a column densely from 0, moving every listed task into it.
    pub async fn set_column(
        conn: &mut MySqlConnection,
        category_id: Option<i64>,
        ordered_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for (position, task_id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE tasks SET category_id = ?, position = ?, updated_at = ? WHERE task_id = ?",
            )
            .bind(category_id)
            .bind(position as i32)
            .bind(now)
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Subtasks always sit in their parent's category.
    pub async fn move_subtasks<'e, E: MySqlExecutor<'e>>(
        executor: E,
        parent_task_id: i64,
        category_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET category_id = ? WHERE parent_task_id = ?")
            .bind(category_id)
            .bind(parent_task_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn count<'e, E: MySqlExecutor<'e>>(executor: E, workspace_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE workspace_id = ?")
            .bind(workspace_id)
            .fetch_one(executor)
            .await
    }

    pub async fn subtask_counts(
        pool: &MySqlPool,
        parent_ids: &[i64],
    ) -> Result<Vec<SubtaskCount>, sqlx::Error> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<MySql> = QueryBuilder::new(
            "SELECT parent_task_id, COUNT(*) AS total, \
             CAST(COALESCE(SUM(status = 'done'), 0) AS SIGNED) AS completed \
             FROM tasks WHERE parent_task_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in parent_ids {
            ids.push_bind(*id);
        }
        query.push(") GROUP BY parent_task_id");
        query.build_query_as::<SubtaskCount>().fetch_all(pool).await
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task() -> Task {
        let created = Utc::now() - Duration::days(1);
        Task {
            task_id: 1,
            workspace_id: 1,
            category_id: Some(3),
            parent_task_id: None,
            title: "Write release notes".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: None,
            position: 0,
            created_by: 1,
            completed_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn priority_colors() {
        assert_eq!(Priority::Low.color(), "#9CA3AF");
        assert_eq!(Priority::Urgent.color(), "#EF4444");
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
    }

    #[test]
    fn completing_stamps_completed_at() {
        let mut t = task();
        let now = Utc::now();
        let changed = TaskChanges {
            status: Some(TaskStatus::Done),
            ..Default::default()
        }
        .apply(&mut t, now);
        assert_eq!(changed, vec!["status"]);
        assert_eq!(t.completed_at, Some(now));
        assert_eq!(t.updated_at, now);
    }

    #[test]
    fn reopening_clears_completed_at() {
        let mut t = task();
        t.status = TaskStatus::Done;
        t.completed_at = Some(Utc::now());
        TaskChanges {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        }
        .apply(&mut t, Utc::now());
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn unchanged_values_are_not_reported() {
        let mut t = task();
        let before = t.updated_at;
        let changed = TaskChanges {
            title: Some("Write release notes".into()),
            category_id: Some(Some(3)),
            ..Default::default()
        }
        .apply(&mut t, Utc::now());
        assert!(changed.is_empty());
        assert_eq!(t.updated_at, before);
    }

    #[test]
    fn nullable_fields_can_be_cleared() {
        let mut t = task();
        t.due_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        let changed = TaskChanges {
            due_date: Some(None),
            category_id: Some(None),
            ..Default::default()
        }
        .apply(&mut t, Utc::now());
        assert_eq!(changed, vec!["due_date", "category_id"]);
        assert_eq!(t.due_date, None);
        assert_eq!(t.category_id, None);
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
