use chrono::{NaiveDate, Utc};
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

use super::string_enum;

string_enum! {
    pub enum ReminderKind {
        DueSoon => "due_soon",
        Overdue => "overdue",
    }
}

impl ReminderKind {
    pub fn for_due_date(due_date: NaiveDate, today: NaiveDate) -> ReminderKind {
        if due_date < today {
            ReminderKind::Overdue
        } else {
            ReminderKind::DueSoon
        }
    }
}

/// An open task with a due date, paired with one of its assignees.
#[derive(Debug, Clone, FromRow)]
pub struct DueAssignment {
    pub task_id: i64,
    pub workspace_id: i64,
    pub workspace_name: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub user_id: i64,
    pub user_email: String,
    pub user_name: String,
}

/// Mirrors `ReminderKind::for_due_date` in SQL; binds `today`.
const KIND_SQL: &str = "CASE WHEN t.due_date < ? THEN 'overdue' ELSE 'due_soon' END";

impl DueAssignment {
    /// Open tasks due on or before `horizon` whose reminder for the current
    /// kind has not been logged yet.
    pub async fn list(
        pool: &MySqlPool,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<DueAssignment>, sqlx::Error> {
        let sql = format!(
            "SELECT t.task_id, t.workspace_id, w.workspace_name, t.title, t.due_date, \
                    u.user_id, u.user_email, COALESCE(u.display_name, u.user_name) AS user_name \
             FROM tasks t \
             JOIN workspaces w ON w.workspace_id = t.workspace_id \
             JOIN task_assignees a ON a.task_id = t.task_id \
             JOIN users u ON u.user_id = a.user_id \
             LEFT JOIN reminder_log r ON r.task_id = t.task_id AND r.user_id = u.user_id \
                  AND r.due_date = t.due_date AND r.kind = {} \
             WHERE t.status <> 'done' AND t.due_date IS NOT NULL AND t.due_date <= ? \
                   AND r.task_id IS NULL \
             ORDER BY t.due_date, t.task_id",
            KIND_SQL
        );
        sqlx::query_as::<_, DueAssignment>(&sql)
            .bind(today)
            .bind(horizon)
            .fetch_all(pool)
            .await
    }
}

pub struct ReminderLog;

impl ReminderLog {
    /// True only for the first call with this key; later calls are no-ops.
    pub async fn record<'e, E: MySqlExecutor<'e>>(
        executor: E,
        task_id: i64,
        user_id: i64,
        kind: ReminderKind,
        due_date: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT IGNORE INTO reminder_log (task_id, user_id, kind, due_date, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(due_date)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_depends_on_due_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(ReminderKind::for_due_date(today, today), ReminderKind::DueSoon);
        assert_eq!(
            ReminderKind::for_due_date(today.succ_opt().unwrap(), today),
            ReminderKind::DueSoon
        );
        assert_eq!(
            ReminderKind::for_due_date(today.pred_opt().unwrap(), today),
            ReminderKind::Overdue
        );
    }

    #[test]
    fn sql_kind_matches_the_rust_rule() {
        assert!(KIND_SQL.contains("due_date < ?"));
        assert!(KIND_SQL.contains(ReminderKind::Overdue.as_str()));
        assert!(KIND_SQL.contains(ReminderKind::DueSoon.as_str()));
    }
}
