use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use sqlx::MySqlPool;

use super::{
    mailer::{MailError, MailMessage, Mailer},
    retry::{RetryDecision, RetryPolicy},
};
use crate::{config::AppConfig, models::email::QueuedEmail};

/// Rows stuck in `sending` longer than this are handed out again.
const STALE_CLAIM_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Sent,
    RetryAt(DateTime<Utc>),
    Failed,
}

/// What to do with a row after one delivery attempt. `attempts` already
/// includes this attempt.
pub fn outcome(
    policy: &RetryPolicy,
    attempts: i32,
    result: &Result<(), MailError>,
    now: DateTime<Utc>,
) -> DeliveryOutcome {
    match result {
        Ok(()) => DeliveryOutcome::Sent,
        Err(e) => match policy.decide(attempts, e.is_transient()) {
            RetryDecision::RetryAfter(delay) => DeliveryOutcome::RetryAt(now + delay),
            RetryDecision::GiveUp => DeliveryOutcome::Failed,
        },
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Drains the `email_queue` outbox on a fixed interval.
pub struct EmailWorker {
    pool: MySqlPool,
    mailer: Arc<dyn Mailer>,
    from: String,
    policy: RetryPolicy,
    batch_size: i64,
    interval: StdDuration,
}

impl EmailWorker {
    pub fn new(pool: MySqlPool, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        Self {
            pool,
            mailer,
            from: config.mail_from.clone(),
            policy: RetryPolicy::new(
                config.email_max_attempts,
                Duration::seconds(config.email_retry_base_secs),
            ),
            batch_size: config.email_batch_size.max(1),
            interval: StdDuration::from_secs(config.email_queue_interval_secs.max(1)),
        }
    }

    pub fn spawn(self) {
        actix_web::rt::spawn(async move { self.run().await });
    }

    async fn run(self) {
        info!("Email worker started, polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(report) if report != BatchReport::default() => info!(
                    "Email batch: {} sent, {} scheduled for retry, {} failed",
                    report.sent, report.retried, report.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Email worker tick failed: {}", e),
            }
        }
    }

    pub async fn run_once(&self) -> Result<BatchReport, sqlx::Error> {
        let now = Utc::now();
        let released =
            QueuedEmail::release_stale(&self.pool, now, Duration::minutes(STALE_CLAIM_MINUTES)).await?;
        if released > 0 {
            warn!("Released {} emails stuck in sending", released);
        }

        let mut report = BatchReport::default();
        for email in QueuedEmail::claim_due(&self.pool, now, self.batch_size).await? {
            match self.deliver(&email).await? {
                DeliveryOutcome::Sent => report.sent += 1,
                DeliveryOutcome::RetryAt(_) => report.retried += 1,
                DeliveryOutcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    async fn deliver(&self, email: &QueuedEmail) -> Result<DeliveryOutcome, sqlx::Error> {
        let result = self
            .mailer
            .send(MailMessage {
                from: &self.from,
                to: &email.recipient,
                subject: &email.subject,
                body: &email.body,
            })
            .await;
        let attempts = email.attempts + 1;
        let decision = outcome(&self.policy, attempts, &result, Utc::now());

        match (&result, &decision) {
            (Ok(()), _) => {
                QueuedEmail::mark_sent(&self.pool, email.email_id, attempts).await?;
            }
            (Err(e), DeliveryOutcome::RetryAt(at)) => {
                warn!("Email {} attempt {} failed, retrying at {}: {}", email.email_id, attempts, at, e);
                QueuedEmail::schedule_retry(&self.pool, email.email_id, attempts, *at, &e.to_string())
                    .await?;
            }
            (Err(e), _) => {
                error!("Email {} to {} failed permanently: {}", email.email_id, email.recipient, e);
                QueuedEmail::mark_failed(&self.pool, email.email_id, attempts, &e.to_string()).await?;
            }
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::seconds(60))
    }

    #[test]
    fn success_is_sent() {
        assert_eq!(outcome(&policy(), 1, &Ok(()), Utc::now()), DeliveryOutcome::Sent);
    }

    #[test]
    fn transient_failure_backs_off_linearly() {
        let now = Utc::now();
        let err = Err(MailError::Transient("timeout".into()));
        assert_eq!(
            outcome(&policy(), 1, &err, now),
            DeliveryOutcome::RetryAt(now + Duration::seconds(60))
        );
        assert_eq!(
            outcome(&policy(), 2, &err, now),
            DeliveryOutcome::RetryAt(now + Duration::seconds(120))
        );
        assert_eq!(outcome(&policy(), 3, &err, now), DeliveryOutcome::Failed);
    }

    #[test]
    fn permanent_failure_stops_immediately() {
        let err = Err(MailError::Permanent("mailbox does not exist".into()));
        assert_eq!(outcome(&policy(), 1, &err, Utc::now()), DeliveryOutcome::Failed);
    }
}
