use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

use super::member::MemberRole;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Workspace {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub owner_user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace as seen by one of its members.
#[derive(Debug, Serialize, FromRow)]
pub struct WorkspaceSummary {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub owner_user_id: i64,
    pub owner_user_name: String,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    pub member_count: i64,
}

impl Workspace {
    pub async fn create<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_name: &str,
        owner_user_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO workspaces (workspace_name, owner_user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(workspace_name)
        .bind(owner_user_id)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<Option<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            "SELECT workspace_id, workspace_name, owner_user_id, created_at, updated_at \
             FROM workspaces WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_for_user(
        pool: &MySqlPool,
        user_id: i64,
    ) -> Result<Vec<WorkspaceSummary>, sqlx::Error> {
        sqlx::query_as::<_, WorkspaceSummary>(
            "SELECT w.workspace_id, w.workspace_name, w.owner_user_id, \
                    o.user_name AS owner_user_name, m.role, \
                    (SELECT COUNT(*) FROM workspace_members c WHERE c.workspace_id = w.workspace_id) AS member_count \
             FROM workspace_members m \
             JOIN workspaces w ON w.workspace_id = m.workspace_id \
             JOIN users o ON o.user_id = w.owner_user_id \
             WHERE m.user_id = ? \
             ORDER BY w.workspace_name",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn rename<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        workspace_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workspaces SET workspace_name = ?, updated_at = ? WHERE workspace_id = ?")
            .bind(workspace_name)
            .bind(Utc::now())
            .bind(workspace_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_owner<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        owner_user_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workspaces SET owner_user_id = ?, updated_at = ? WHERE workspace_id = ?")
            .bind(owner_user_id)
            .bind(Utc::now())
            .bind(workspace_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Members, boards, invitations and the activity log go with it.
    pub async fn delete<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspaces WHERE workspace_id = ?")
            .bind(workspace_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
