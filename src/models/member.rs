use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

use super::string_enum;
use crate::error::ApiError;

string_enum! {
    pub enum MemberRole {
        Owner => "owner",
        Admin => "admin",
        Member => "member",
    }
}

impl MemberRole {
    fn rank(self) -> u8 {
        match self {
            MemberRole::Owner => 3,
            MemberRole::Admin => 2,
            MemberRole::Member => 1,
        }
    }

    pub fn at_least(self, required: MemberRole) -> bool {
        self.rank() >= required.rank()
    }
}

/// Who may set `target`'s role to `new_role`.
pub fn check_role_change(
    actor: MemberRole,
    target: MemberRole,
    new_role: MemberRole,
) -> Result<(), &'static str> {
    if new_role == MemberRole::Owner {
        return Err("Ownership can only be transferred");
    }
    if target == MemberRole::Owner {
        return Err("The owner's role cannot be changed");
    }
    if !actor.at_least(MemberRole::Admin) {
        return Err("Admin access required");
    }
    if actor != MemberRole::Owner && (target == MemberRole::Admin || new_role == MemberRole::Admin) {
        return Err("Only the owner can manage admins");
    }
    Ok(())
}

pub fn check_removal(actor: MemberRole, target: MemberRole) -> Result<(), &'static str> {
    if target == MemberRole::Owner {
        return Err("The owner cannot be removed");
    }
    if !actor.at_least(MemberRole::Admin) {
        return Err("Admin access required");
    }
    if actor == MemberRole::Admin && target == MemberRole::Admin {
        return Err("Only the owner can remove admins");
    }
    Ok(())
}

/// Roles an invitation may grant.
pub fn check_invite_role(actor: MemberRole, role: MemberRole) -> Result<(), &'static str> {
    match role {
        MemberRole::Owner => Err("Invitations cannot grant ownership"),
        MemberRole::Admin if actor != MemberRole::Owner => Err("Only the owner can invite admins"),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct MemberProfile {
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub display_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

pub struct Membership;

impl Membership {
    pub async fn role_of<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        role.map(|r| {
            r.parse::<MemberRole>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
    }

    /// Non-members get a 404 so workspace ids cannot be probed.
    pub async fn require(
        pool: &MySqlPool,
        workspace_id: i64,
        user_id: i64,
    ) -> Result<MemberRole, ApiError> {
        Self::role_of(pool, workspace_id, user_id)
            .await?
            .ok_or(ApiError::NotFound("Workspace"))
    }

    pub async fn require_role(
        pool: &MySqlPool,
        workspace_id: i64,
        user_id: i64,
        required: MemberRole,
    ) -> Result<MemberRole, ApiError> {
        let role = Self::require(pool, workspace_id, user_id).await?;
        if !role.at_least(required) {
            return Err(ApiError::forbidden(match required {
                MemberRole::Owner => "Owner access required",
                _ => "Admin access required",
            }));
        }
        Ok(role)
    }

    pub async fn add<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_role<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE workspace_members SET role = ? WHERE workspace_id = ? AND user_id = ?")
                .bind(role.as_str())
                .bind(workspace_id)
                .bind(user_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn remove<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        user_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(user_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn list(pool: &MySqlPool, workspace_id: i64) -> Result<Vec<MemberProfile>, sqlx::Error> {
        sqlx::query_as::<_, MemberProfile>(
            "SELECT u.user_id, u.user_name, u.user_email, u.display_name, m.role, m.joined_at \
             FROM workspace_members m \
             JOIN users u ON u.user_id = m.user_id \
             WHERE m.workspace_id = ? \
             ORDER BY FIELD(m.role, 'owner', 'admin', 'member'), u.user_name",
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ?")
            .bind(workspace_id)
            .fetch_one(executor)
            .await
    }

    pub async fn email_is_member<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workspace_members m \
             JOIN users u ON u.user_id = m.user_id \
             WHERE m.workspace_id = ? AND u.user_email = ?",
        )
        .bind(workspace_id)
        .bind(email)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MemberRole::*;

    #[test]
    fn role_ordering() {
        assert!(Owner.at_least(Admin));
        assert!(Admin.at_least(Member));
        assert!(!Member.at_least(Admin));
        assert!(Admin.at_least(Admin));
    }

    #[test]
    fn nobody_can_grant_ownership_by_role_change() {
        assert!(check_role_change(Owner, Member, Owner).is_err());
    }

    #[test]
    fn owner_role_is_fixed() {
        assert!(check_role_change(Owner, Owner, Admin).is_err());
    }

    #[test]
    fn admins_manage_members_but_not_admins() {
        assert!(check_role_change(Admin, Member, Member).is_ok());
        assert!(check_role_change(Admin, Member, Admin).is_err());
        assert!(check_role_change(Admin, Admin, Member).is_err());
        assert!(check_role_change(Owner, Admin, Member).is_ok());
        assert!(check_role_change(Owner, Member, Admin).is_ok());
        assert!(check_role_change(Member, Member, Member).is_err());
    }

    #[test]
    fn removal_rules() {
        assert!(check_removal(Owner, Admin).is_ok());
        assert!(check_removal(Admin, Member).is_ok());
        assert!(check_removal(Admin, Admin).is_err());
        assert!(check_removal(Member, Member).is_err());
        assert!(check_removal(Owner, Owner).is_err());
    }

    #[test]
    fn invite_roles() {
        assert!(check_invite_role(Admin, Member).is_ok());
        assert!(check_invite_role(Admin, Admin).is_err());
        assert!(check_invite_role(Owner, Admin).is_ok());
        assert!(check_invite_role(Owner, Owner).is_err());
    }
}
