use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{types::Json, FromRow, MySqlExecutor, MySqlPool};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// One row of the append-only audit trail.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityEntry {
    pub activity_id: i64,
    pub workspace_id: i64,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

/// Recorded inside the same transaction as the mutation it describes.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub workspace_id: i64,
    pub actor_id: i64,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i64>,
    pub details: Value,
}

impl NewActivity {
    pub fn new(workspace_id: i64, actor_id: i64, action: &'static str) -> Self {
        let entity_type = action.split('.').next().unwrap_or(action);
        Self {
            workspace_id,
            actor_id,
            action,
            entity_type,
            entity_id: None,
            details: Value::Null,
        }
    }

    pub fn entity(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub async fn record<'e, E: MySqlExecutor<'e>>(self, executor: E) -> Result<(), sqlx::Error> {
        let details = (!self.details.is_null()).then_some(Json(self.details));
        sqlx::query(
            "INSERT INTO activity_log \
             (workspace_id, actor_id, action, entity_type, entity_id, details, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.workspace_id)
        .bind(self.actor_id)
        .bind(self.action)
        .bind(self.entity_type)
        .bind(self.entity_id)
        .bind(details)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }
}

pub fn clamp_page_size(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

impl ActivityEntry {
    /// Newest first. `before` pages backwards by activity id.
    pub async fn list(
        pool: &MySqlPool,
        workspace_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>, sqlx::Error> {
        sqlx::query_as::<_, ActivityEntry>(
            "SELECT a.activity_id, a.workspace_id, a.actor_id, \
                    COALESCE(u.display_name, u.user_name) AS actor_name, \
                    a.action, a.entity_type, a.entity_id, a.details, a.created_at \
             FROM activity_log a \
             LEFT JOIN users u ON u.user_id = a.actor_id \
             WHERE a.workspace_id = ? AND (? IS NULL OR a.activity_id < ?) \
             ORDER BY a.activity_id DESC \
             LIMIT ?",
        )
        .bind(workspace_id)
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_type_comes_from_the_action_prefix() {
        let entry = NewActivity::new(1, 2, "task.moved").entity(9);
        assert_eq!(entry.entity_type, "task");
        assert_eq!(entry.entity_id, Some(9));
        assert!(entry.details.is_null());
    }

    #[test]
    fn details_are_attached() {
        let entry = NewActivity::new(1, 2, "member.role_changed").details(json!({"role": "admin"}));
        assert_eq!(entry.details["role"], "admin");
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(Some(1000)), MAX_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(20)), 20);
    }
}
