use serde::Serialize;
use sqlx::{FromRow, MySql, MySqlExecutor, MySqlPool, QueryBuilder};

use chrono::Utc;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskAssignee {
    #[serde(skip)]
    pub task_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub display_name: Option<String>,
}

pub struct Assignment;

impl Assignment {
    /// Returns false when the user was already assigned.
    pub async fn add<'e, E: MySqlExecutor<'e>>(
        executor: E,
        task_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT IGNORE INTO task_assignees (task_id, user_id, assigned_at) VALUES (?, ?, ?)",
        )
        .bind(task_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove<'e, E: MySqlExecutor<'e>>(
        executor: E,
        task_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_assignees WHERE task_id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drops every assignment `user_id` holds inside the workspace.
    pub async fn remove_for_member<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        user_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE a FROM task_assignees a \
             JOIN tasks t ON t.task_id = a.task_id \
             WHERE t.workspace_id = ? AND a.user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn for_tasks(
        pool: &MySqlPool,
        task_ids: &[i64],
    ) -> Result<Vec<TaskAssignee>, sqlx::Error> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<MySql> = QueryBuilder::new(
            "SELECT a.task_id, u.user_id, u.user_name, u.display_name \
             FROM task_assignees a \
             JOIN users u ON u.user_id = a.user_id \
             WHERE a.task_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in task_ids {
            ids.push_bind(*id);
        }
        query.push(") ORDER BY a.assigned_at, u.user_name");
        query.build_query_as::<TaskAssignee>().fetch_all(pool).await
    }
}
