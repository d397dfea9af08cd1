use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub comment_id: i64,
    pub task_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn edited(&self) -> bool {
        self.updated_at > self.created_at
    }

    pub async fn list_for_task(pool: &MySqlPool, task_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            "SELECT c.comment_id, c.task_id, c.author_id, \
                    COALESCE(u.display_name, u.user_name) AS author_name, \
                    c.body, c.created_at, c.updated_at \
             FROM comments c JOIN users u ON u.user_id = c.author_id \
             WHERE c.task_id = ? ORDER BY c.created_at, c.comment_id",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    /// Scoped by workspace so a comment id from another tenant is a 404.
    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            "SELECT c.comment_id, c.task_id, c.author_id, \
                    COALESCE(u.display_name, u.user_name) AS author_name, \
                    c.body, c.created_at, c.updated_at \
             FROM comments c \
             JOIN users u ON u.user_id = c.author_id \
             JOIN tasks t ON t.task_id = c.task_id \
             WHERE t.workspace_id = ? AND c.comment_id = ?",
        )
        .bind(workspace_id)
        .bind(comment_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E: MySqlExecutor<'e>>(
        executor: E,
        task_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO comments (task_id, author_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(author_id)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn update_body<'e, E: MySqlExecutor<'e>>(
        executor: E,
        comment_id: i64,
        body: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE comments SET body = ?, updated_at = ? WHERE comment_id = ?")
            .bind(body)
            .bind(Utc::now())
            .bind(comment_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E: MySqlExecutor<'e>>(executor: E, comment_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE comment_id = ?")
            .bind(comment_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
