use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlExecutor, MySqlPool};
use uuid::Uuid;

use crate::auth::tokens::{generate_token, hash_token};

/// Short-lived access session behind the `session_id` cookie.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub session_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub is_persistent: bool,
}

impl Session {
    /// Stores a new session and returns the raw id for the cookie.
    pub async fn create<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
        ttl: Duration,
        is_persistent: bool,
    ) -> Result<String, sqlx::Error> {
        let session_id = generate_token();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sessions (session_hash, user_id, expires_at, is_persistent, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hash_token(&session_id))
        .bind(user_id)
        .bind(now + ttl)
        .bind(is_persistent)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(session_id)
    }

    pub async fn find_active(
        pool: &MySqlPool,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "SELECT session_hash, user_id, expires_at, is_persistent FROM sessions \
             WHERE session_hash = ? AND expires_at > ?",
        )
        .bind(hash_token(session_id))
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &MySqlPool, session_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_hash = ?")
            .bind(hash_token(session_id))
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_user<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub refresh_token_id: i64,
    pub user_id: i64,
    pub family_id: String,
    pub is_persistent: bool,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Set only when the token was exchanged for its successor.
    pub rotated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCheck {
    Valid,
    Expired,
    /// Revoked by logout or a password change.
    Revoked,
    /// Already rotated: someone replayed an old token.
    Reused,
}

/// What the refresh endpoint does with a presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPlan {
    /// `None` rotates the token; otherwise the request fails with this message.
    pub rejection: Option<&'static str>,
    pub revoke_family: bool,
    pub end_all_sessions: bool,
}

impl RefreshCheck {
    pub fn plan(self) -> RefreshPlan {
        let reject = |message| RefreshPlan {
            rejection: Some(message),
            revoke_family: false,
            end_all_sessions: false,
        };
        match self {
            RefreshCheck::Valid => RefreshPlan {
                rejection: None,
                revoke_family: false,
                end_all_sessions: false,
            },
            RefreshCheck::Expired => reject("Login is needed, session expired"),
            RefreshCheck::Revoked => reject("Login is needed"),
            RefreshCheck::Reused => RefreshPlan {
                rejection: Some("Login is needed"),
                revoke_family: true,
                end_all_sessions: true,
            },
        }
    }
}

impl RefreshToken {
    pub fn check(&self, now: DateTime<Utc>) -> RefreshCheck {
        if self.rotated_at.is_some() {
            RefreshCheck::Reused
        } else if self.revoked_at.is_some() {
            RefreshCheck::Revoked
        } else if self.expires_at <= now {
            RefreshCheck::Expired
        } else {
            RefreshCheck::Valid
        }
    }

    /// Issues a token in `family_id`, or starts a new family on login.
    /// Returns the raw token for the cookie.
    pub async fn issue<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
        family_id: Option<&str>,
        is_persistent: bool,
        ttl: Duration,
    ) -> Result<String, sqlx::Error> {
        let token = generate_token();
        let family_id = family_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO refresh_tokens \
             (user_id, family_id, token_hash, is_persistent, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(family_id)
        .bind(hash_token(&token))
        .bind(is_persistent)
        .bind(now + ttl)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(token)
    }

    /// Row lock held until the surrounding transaction ends, so two
    /// concurrent refreshes cannot both rotate the same token.
    pub async fn find_for_update<'e, E: MySqlExecutor<'e>>(
        executor: E,
        token: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT refresh_token_id, user_id, family_id, is_persistent, expires_at, revoked_at, rotated_at \
             FROM refresh_tokens WHERE token_hash = ? FOR UPDATE",
        )
        .bind(hash_token(token))
        .fetch_optional(executor)
        .await
    }

    pub async fn find(pool: &MySqlPool, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT refresh_token_id, user_id, family_id, is_persistent, expires_at, revoked_at, rotated_at \
             FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await
    }

    /// Retires a token that has just been exchanged for its successor.
    pub async fn rotate<'e, E: MySqlExecutor<'e>>(
        executor: E,
        refresh_token_id: i64,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ?, rotated_at = ? \
             WHERE refresh_token_id = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(refresh_token_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn revoke_family<'e, E: MySqlExecutor<'e>>(
        executor: E,
        family_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE family_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(family_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn revoke_all_for_user<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: Duration, revoked: bool) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            refresh_token_id: 1,
            user_id: 1,
            family_id: "family".into(),
            is_persistent: false,
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            rotated_at: None,
        }
    }

    fn rotated(expires_in: Duration) -> RefreshToken {
        let mut token = token(expires_in, true);
        token.rotated_at = token.revoked_at;
        token
    }

    #[test]
    fn fresh_token_is_valid() {
        assert_eq!(token(Duration::hours(1), false).check(Utc::now()), RefreshCheck::Valid);
    }

    #[test]
    fn expired_token_is_rejected() {
        assert_eq!(token(Duration::hours(-1), false).check(Utc::now()), RefreshCheck::Expired);
    }

    #[test]
    fn rotated_token_counts_as_reuse_even_if_expired() {
        assert_eq!(rotated(Duration::hours(1)).check(Utc::now()), RefreshCheck::Reused);
        assert_eq!(rotated(Duration::hours(-1)).check(Utc::now()), RefreshCheck::Reused);
    }

    #[test]
    fn token_revoked_by_logout_or_password_change_is_not_reuse() {
        let stale = token(Duration::hours(1), true);
        assert_eq!(stale.check(Utc::now()), RefreshCheck::Revoked);

        let plan = stale.check(Utc::now()).plan();
        assert_eq!(plan.rejection, Some("Login is needed"));
        assert!(!plan.revoke_family);
        assert!(!plan.end_all_sessions);
    }

    #[test]
    fn only_valid_tokens_rotate() {
        assert_eq!(RefreshCheck::Valid.plan().rejection, None);
        for check in [RefreshCheck::Expired, RefreshCheck::Revoked, RefreshCheck::Reused] {
            assert!(check.plan().rejection.is_some(), "{:?}", check);
        }
    }

    #[test]
    fn reuse_revokes_the_family_and_every_session() {
        let plan = RefreshCheck::Reused.plan();
        assert!(plan.revoke_family);
        assert!(plan.end_all_sessions);

        for check in [RefreshCheck::Valid, RefreshCheck::Expired, RefreshCheck::Revoked] {
            let plan = check.plan();
            assert!(!plan.revoke_family && !plan.end_all_sessions, "{:?}", check);
        }
    }

    #[test]
    fn expired_tokens_say_so() {
        assert_eq!(
            RefreshCheck::Expired.plan().rejection,
            Some("Login is needed, session expired")
        );
    }
}
