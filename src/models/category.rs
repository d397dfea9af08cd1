use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlConnection, MySqlExecutor, MySqlPool};

pub const DEFAULT_COLOR: &str = "#6B7280";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub category_id: i64,
    pub workspace_id: i64,
    pub category_name: String,
    pub color: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

const CATEGORY_COLUMNS: &str = "category_id, workspace_id, category_name, color, position, created_at";

impl Category {
    pub async fn list(pool: &MySqlPool, workspace_id: i64) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE workspace_id = ? ORDER BY position, category_id",
            CATEGORY_COLUMNS
        ))
        .bind(workspace_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        category_id: i64,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE workspace_id = ? AND category_id = ?",
            CATEGORY_COLUMNS
        ))
        .bind(workspace_id)
        .bind(category_id)
        .fetch_optional(executor)
        .await
    }

    /// Appends the category after the existing ones.
    pub async fn create(
        conn: &mut MySqlConnection,
        workspace_id: i64,
        category_name: &str,
        color: &str,
    ) -> Result<i64, sqlx::Error> {
        let next_position: i32 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(MAX(position) + 1, 0) AS SIGNED) FROM categories WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&mut *conn)
        .await
        .map(|p: i64| p as i32)?;

        let result = sqlx::query(
            "INSERT INTO categories (workspace_id, category_name, color, position, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(category_name)
        .bind(color)
        .bind(next_position)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn update<'e, E: MySqlExecutor<'e>>(
        executor: E,
        category_id: i64,
        category_name: &str,
        color: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE categories SET category_name = ?, color = ? WHERE category_id = ?")
            .bind(category_name)
            .bind(color)
            .bind(category_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Tasks still pointing at the category fall back to uncategorised
    /// through the foreign key, keeping their old positions.
    pub async fn delete<'e, E: MySqlExecutor<'e>>(
        executor: E,
        category_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE category_id = ?")
            .bind(category_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn ids_for_update(
        conn: &mut MySqlConnection,
        workspace_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT category_id FROM categories WHERE workspace_id = ? ORDER BY position FOR UPDATE",
        )
        .bind(workspace_id)
        .fetch_all(conn)
        .await
    }

    pub async fn set_positions(conn: &mut MySqlConnection, ordered_ids: &[i64]) -> Result<(), sqlx::Error> {
        for (position, category_id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE categories SET position = ? WHERE category_id = ?")
                .bind(position as i32)
                .bind(category_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}
