use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

use super::string_enum;

string_enum! {
    pub enum EmailStatus {
        Pending => "pending",
        Sending => "sending",
        Sent => "sent",
        Failed => "failed",
    }
}

/// A message ready to be queued.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct QueuedEmail {
    pub email_id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub status: EmailStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
}

impl OutgoingEmail {
    /// Inserted with the caller's executor so a rolled back mutation
    /// never sends mail.
    pub async fn enqueue<'e, E: MySqlExecutor<'e>>(&self, executor: E) -> Result<i64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO email_queue (recipient, subject, body, status, attempts, next_attempt_at, created_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&self.recipient)
        .bind(&self.subject)
        .bind(&self.body)
        .bind(EmailStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.last_insert_id() as i64)
    }
}

impl QueuedEmail {
    /// Rows left in `sending` by a worker that died mid-batch.
    pub async fn release_stale(
        pool: &MySqlPool,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE email_queue SET status = 'pending', locked_at = NULL \
             WHERE status = 'sending' AND locked_at < ?",
        )
        .bind(now - stale_after)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Marks up to `limit` due rows as `sending` and returns them. Rows
    /// locked by another worker are skipped.
    pub async fn claim_due(
        pool: &MySqlPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueuedEmail>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let emails = sqlx::query_as::<_, QueuedEmail>(
            "SELECT email_id, recipient, subject, body, status, attempts, last_error, next_attempt_at \
             FROM email_queue \
             WHERE status = 'pending' AND next_attempt_at <= ? \
             ORDER BY next_attempt_at, email_id \
             LIMIT ? \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        for email in &emails {
            sqlx::query("UPDATE email_queue SET status = 'sending', locked_at = ? WHERE email_id = ?")
                .bind(now)
                .bind(email.email_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(emails)
    }

    pub async fn mark_sent(pool: &MySqlPool, email_id: i64, attempts: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE email_queue SET status = 'sent', attempts = ?, sent_at = ?, locked_at = NULL, \
             last_error = NULL WHERE email_id = ?",
        )
        .bind(attempts)
        .bind(Utc::now())
        .bind(email_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn schedule_retry(
        pool: &MySqlPool,
        email_id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE email_queue SET status = 'pending', attempts = ?, next_attempt_at = ?, \
             last_error = ?, locked_at = NULL WHERE email_id = ?",
        )
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(error)
        .bind(email_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        pool: &MySqlPool,
        email_id: i64,
        attempts: i32,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE email_queue SET status = 'failed', attempts = ?, last_error = ?, locked_at = NULL \
             WHERE email_id = ?",
        )
        .bind(attempts)
        .bind(error)
        .bind(email_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
