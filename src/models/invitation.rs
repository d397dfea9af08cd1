use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

use super::{member::MemberRole, string_enum};
use crate::auth::tokens::hash_token;

string_enum! {
    pub enum InvitationStatus {
        Pending => "pending",
        Accepted => "accepted",
        Revoked => "revoked",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invitation {
    pub invitation_id: i64,
    pub workspace_id: i64,
    pub invited_by: i64,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

/// What an invitee sees before accepting.
#[derive(Debug, Serialize, FromRow)]
pub struct InvitationPreview {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub invited_by_name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
}

const INVITATION_COLUMNS: &str = "invitation_id, workspace_id, invited_by, email, role, status, \
                                  expires_at, created_at, accepted_at";

impl Invitation {
    /// Why this invitation can no longer be accepted, if it can't.
    pub fn unusable_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        match self.status {
            InvitationStatus::Accepted => Some("Invitation has already been accepted"),
            InvitationStatus::Revoked => Some("Invitation has been revoked"),
            InvitationStatus::Pending if self.expires_at <= now => Some("Invitation has expired"),
            InvitationStatus::Pending => None,
        }
    }

    pub async fn create<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        invited_by: i64,
        email: &str,
        role: MemberRole,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO invitations \
             (workspace_id, invited_by, email, role, token_hash, status, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(invited_by)
        .bind(email)
        .bind(role.as_str())
        .bind(hash_token(token))
        .bind(InvitationStatus::Pending.as_str())
        .bind(expires_at)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        invitation_id: i64,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations WHERE workspace_id = ? AND invitation_id = ?",
            INVITATION_COLUMNS
        ))
        .bind(workspace_id)
        .bind(invitation_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_token<'e, E: MySqlExecutor<'e>>(
        executor: E,
        token: &str,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations WHERE token_hash = ? FOR UPDATE",
            INVITATION_COLUMNS
        ))
        .bind(hash_token(token))
        .fetch_optional(executor)
        .await
    }

    pub async fn preview(
        pool: &MySqlPool,
        token: &str,
    ) -> Result<Option<InvitationPreview>, sqlx::Error> {
        sqlx::query_as::<_, InvitationPreview>(
            "SELECT i.workspace_id, w.workspace_name, \
                    COALESCE(u.display_name, u.user_name) AS invited_by_name, \
                    i.email, i.role, i.status, i.expires_at \
             FROM invitations i \
             JOIN workspaces w ON w.workspace_id = i.workspace_id \
             JOIN users u ON u.user_id = i.invited_by \
             WHERE i.token_hash = ?",
        )
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await
    }

    pub async fn list_pending(
        pool: &MySqlPool,
        workspace_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations \
             WHERE workspace_id = ? AND status = 'pending' AND expires_at > ? \
             ORDER BY created_at DESC",
            INVITATION_COLUMNS
        ))
        .bind(workspace_id)
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn count_pending<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM invitations \
             WHERE workspace_id = ? AND status = 'pending' AND expires_at > ?",
        )
        .bind(workspace_id)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn pending_for_email<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invitations \
             WHERE workspace_id = ? AND email = ? AND status = 'pending' AND expires_at > ?",
        )
        .bind(workspace_id)
        .bind(email)
        .bind(now)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }

    pub async fn set_status<'e, E: MySqlExecutor<'e>>(
        executor: E,
        invitation_id: i64,
        status: InvitationStatus,
    ) -> Result<(), sqlx::Error> {
        let accepted_at = (status == InvitationStatus::Accepted).then(Utc::now);
        sqlx::query("UPDATE invitations SET status = ?, accepted_at = ? WHERE invitation_id = ?")
            .bind(status.as_str())
            .bind(accepted_at)
            .bind(invitation_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Expired pending invitations are removed by the cleanup job.
    pub async fn purge_expired(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM invitations WHERE status = 'pending' AND expires_at <= ?")
                .bind(now)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Invitation {
        let now = Utc::now();
        Invitation {
            invitation_id: 1,
            workspace_id: 1,
            invited_by: 1,
            email: "new@example.com".into(),
            role: MemberRole::Member,
            status,
            expires_at: now + expires_in,
            created_at: now,
            accepted_at: None,
        }
    }

    #[test]
    fn pending_unexpired_invitation_is_usable() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(1));
        assert_eq!(inv.unusable_reason(Utc::now()), None);
    }

    #[test]
    fn expired_accepted_and_revoked_are_not() {
        let now = Utc::now();
        assert_eq!(
            invitation(InvitationStatus::Pending, Duration::days(-1)).unusable_reason(now),
            Some("Invitation has expired")
        );
        assert!(invitation(InvitationStatus::Accepted, Duration::days(1))
            .unusable_reason(now)
            .is_some());
        assert!(invitation(InvitationStatus::Revoked, Duration::days(1))
            .unusable_reason(now)
            .is_some());
    }
}
