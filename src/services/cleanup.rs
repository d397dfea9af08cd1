use std::time::Duration as StdDuration;

use chrono::Utc;
use log::{error, info};
use sqlx::MySqlPool;

use crate::models::{
    invitation::Invitation,
    session::{RefreshToken, Session},
};

const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// Hourly removal of expired sessions, refresh tokens and invitations.
pub fn spawn(pool: MySqlPool) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = run_once(&pool).await {
                error!("Cleanup failed: {}", e);
            }
        }
    });
}

pub async fn run_once(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let sessions = Session::purge_expired(pool, now).await?;
    let refresh_tokens = RefreshToken::purge_expired(pool, now).await?;
    let invitations = Invitation::purge_expired(pool, now).await?;
    if sessions + refresh_tokens + invitations > 0 {
        info!(
            "Removed {} expired sessions, {} refresh tokens, {} invitations",
            sessions, refresh_tokens, invitations
        );
    }
    Ok(())
}
