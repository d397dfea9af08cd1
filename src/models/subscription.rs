use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlConnection, MySqlExecutor};

use super::{invitation::Invitation, member::Membership, string_enum, task::Task};

string_enum! {
    pub enum Plan {
        Free => "free",
        Pro => "pro",
        Team => "team",
    }
}

string_enum! {
    pub enum SubscriptionStatus {
        Active => "active",
        Canceled => "canceled",
    }
}

pub const BILLING_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanDetails {
    pub plan: Plan,
    pub name: &'static str,
    pub price_cents_per_month: u32,
    /// `None` means unlimited.
    pub max_members: Option<i64>,
    pub max_tasks: Option<i64>,
}

impl Plan {
    pub fn details(self) -> PlanDetails {
        match self {
            Plan::Free => PlanDetails {
                plan: self,
                name: "Free",
                price_cents_per_month: 0,
                max_members: Some(5),
                max_tasks: Some(100),
            },
            Plan::Pro => PlanDetails {
                plan: self,
                name: "Pro",
                price_cents_per_month: 1200,
                max_members: Some(25),
                max_tasks: Some(5000),
            },
            Plan::Team => PlanDetails {
                plan: self,
                name: "Team",
                price_cents_per_month: 4900,
                max_members: None,
                max_tasks: None,
            },
        }
    }

    pub fn catalog() -> Vec<PlanDetails> {
        Plan::ALL.iter().map(|plan| plan.details()).collect()
    }
}

/// Seats count pending invitations, so a workspace cannot over-invite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub members: i64,
    pub pending_invitations: i64,
    pub tasks: i64,
}

impl Usage {
    pub fn seats(&self) -> i64 {
        self.members + self.pending_invitations
    }

    pub async fn load(
        conn: &mut MySqlConnection,
        workspace_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Usage, sqlx::Error> {
        Ok(Usage {
            members: Membership::count(&mut *conn, workspace_id).await?,
            pending_invitations: Invitation::count_pending(&mut *conn, workspace_id, now).await?,
            tasks: Task::count(&mut *conn, workspace_id).await?,
        })
    }
}

impl PlanDetails {
    pub fn allows_another_seat(&self, usage: &Usage) -> bool {
        self.max_members.map_or(true, |max| usage.seats() < max)
    }

    /// Accepting an invitation turns a pending seat into a member, so only
    /// actual members count here.
    pub fn allows_joining(&self, usage: &Usage) -> bool {
        self.max_members.map_or(true, |max| usage.members < max)
    }

    pub fn allows_another_task(&self, usage: &Usage) -> bool {
        self.max_tasks.map_or(true, |max| usage.tasks < max)
    }

    /// Why current usage would not fit this plan, if it wouldn't.
    pub fn overage(&self, usage: &Usage) -> Option<String> {
        if let Some(max) = self.max_members {
            if usage.seats() > max {
                return Some(format!(
                    "The {} plan allows {} members; this workspace has {} members and pending invitations",
                    self.name,
                    max,
                    usage.seats()
                ));
            }
        }
        if let Some(max) = self.max_tasks {
            if usage.tasks > max {
                return Some(format!(
                    "The {} plan allows {} tasks; this workspace has {}",
                    self.name, max, usage.tasks
                ));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    pub workspace_id: i64,
    #[sqlx(try_from = "String")]
    pub plan: Plan,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub async fn create_free<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO subscriptions (workspace_id, plan, status, current_period_end, created_at, updated_at) \
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(workspace_id)
        .bind(Plan::Free.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            "SELECT workspace_id, plan, status, current_period_end, created_at, updated_at \
             FROM subscriptions WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_optional(executor)
        .await
    }

    /// Workspaces created before billing existed have no row; they are on
    /// the free plan.
    pub async fn plan_of<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
    ) -> Result<Plan, sqlx::Error> {
        Ok(Self::find(executor, workspace_id)
            .await?
            .map(|subscription| subscription.plan)
            .unwrap_or(Plan::Free))
    }

    /// Locks the workspace row until the transaction ends, so plan-limit
    /// checks on the same workspace run one at a time, and returns the plan.
    pub async fn lock_plan(conn: &mut MySqlConnection, workspace_id: i64) -> Result<Plan, sqlx::Error> {
        sqlx::query("SELECT workspace_id FROM workspaces WHERE workspace_id = ? FOR UPDATE")
            .bind(workspace_id)
            .execute(&mut *conn)
            .await?;
        Self::plan_of(&mut *conn, workspace_id).await
    }

    /// Paid plans get a fresh billing period; the free plan has none.
    pub async fn set_plan<'e, E: MySqlExecutor<'e>>(
        executor: E,
        workspace_id: i64,
        plan: Plan,
        status: SubscriptionStatus,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let period_end = (plan != Plan::Free).then(|| now + Duration::days(BILLING_PERIOD_DAYS));
        sqlx::query(
            "INSERT INTO subscriptions (workspace_id, plan, status, current_period_end, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE plan = VALUES(plan), status = VALUES(status), \
             current_period_end = VALUES(current_period_end), updated_at = VALUES(updated_at)",
        )
        .bind(workspace_id)
        .bind(plan.as_str())
        .bind(status.as_str())
        .bind(period_end)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_every_plan_in_order() {
        let plans: Vec<Plan> = Plan::catalog().iter().map(|d| d.plan).collect();
        assert_eq!(plans, vec![Plan::Free, Plan::Pro, Plan::Team]);
    }

    #[test]
    fn free_plan_seat_limit_counts_pending_invitations() {
        let free = Plan::Free.details();
        let usage = Usage {
            members: 3,
            pending_invitations: 1,
            tasks: 0,
        };
        assert!(free.allows_another_seat(&usage));
        let full = Usage {
            pending_invitations: 2,
            ..usage
        };
        assert!(!free.allows_another_seat(&full));
    }

    #[test]
    fn joining_ignores_pending_invitations() {
        let free = Plan::Free.details();
        let usage = Usage {
            members: 4,
            pending_invitations: 1,
            tasks: 0,
        };
        assert!(free.allows_joining(&usage));
        assert!(!free.allows_joining(&Usage { members: 5, ..usage }));
    }

    #[test]
    fn team_plan_is_unlimited() {
        let team = Plan::Team.details();
        let usage = Usage {
            members: 10_000,
            pending_invitations: 0,
            tasks: 1_000_000,
        };
        assert!(team.allows_another_seat(&usage));
        assert!(team.allows_another_task(&usage));
        assert_eq!(team.overage(&usage), None);
    }

    #[test]
    fn downgrade_overage_is_explained() {
        let usage = Usage {
            members: 2,
            pending_invitations: 0,
            tasks: 150,
        };
        let reason = Plan::Free.details().overage(&usage).unwrap();
        assert!(reason.contains("100 tasks"));
        assert_eq!(Plan::Pro.details().overage(&usage), None);
    }

    #[test]
    fn task_limit_is_exclusive() {
        let free = Plan::Free.details();
        let at_limit = Usage {
            tasks: 100,
            ..Usage::default()
        };
        assert!(!free.allows_another_task(&at_limit));
        assert_eq!(free.overage(&at_limit), None);
    }
}
