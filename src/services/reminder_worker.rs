use std::time::Duration as StdDuration;

use chrono::{Days, NaiveDate, Utc};
use log::{error, info};
use sqlx::MySqlPool;

use super::email_templates;
use crate::{
    config::AppConfig,
    models::reminder::{DueAssignment, ReminderKind, ReminderLog},
};

/// How far ahead "due soon" reaches: today and tomorrow.
const LOOKAHEAD_DAYS: u64 = 1;

/// Queues due-soon and overdue emails for task assignees, once per
/// (task, assignee, kind, due date).
pub struct ReminderWorker {
    pool: MySqlPool,
    config: AppConfig,
    interval: StdDuration,
}

impl ReminderWorker {
    pub fn new(pool: MySqlPool, config: &AppConfig) -> Self {
        Self {
            pool,
            config: config.clone(),
            interval: StdDuration::from_secs(config.reminder_interval_secs.max(60)),
        }
    }

    pub fn spawn(self) {
        actix_web::rt::spawn(async move { self.run().await });
    }

    async fn run(self) {
        info!("Reminder worker started, scanning every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            match self.run_once(today).await {
                Ok(0) => {}
                Ok(queued) => info!("Queued {} task reminders", queued),
                Err(e) => error!("Reminder scan failed: {}", e),
            }
        }
    }

    pub async fn run_once(&self, today: NaiveDate) -> Result<usize, sqlx::Error> {
        let horizon = today
            .checked_add_days(Days::new(LOOKAHEAD_DAYS))
            .unwrap_or(today);
        let mut queued = 0;

        for assignment in DueAssignment::list(&self.pool, today, horizon).await? {
            let kind = ReminderKind::for_due_date(assignment.due_date, today);
            let mut tx = self.pool.begin().await?;
            let first_time = ReminderLog::record(
                &mut *tx,
                assignment.task_id,
                assignment.user_id,
                kind,
                assignment.due_date,
            )
            .await?;
            if first_time {
                let url = self.config.task_url(assignment.workspace_id, assignment.task_id);
                email_templates::reminder(&assignment, kind, today, &url)
                    .enqueue(&mut *tx)
                    .await?;
                queued += 1;
            }
            tx.commit().await?;
        }
        Ok(queued)
    }
}
