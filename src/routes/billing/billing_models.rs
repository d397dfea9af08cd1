use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::subscription::{Plan, PlanDetails, SubscriptionStatus, Usage};

#[derive(Serialize)]
pub struct PlanCatalogResponse {
    pub success: bool,
    pub plans: Vec<PlanDetails>,
}

#[derive(Deserialize)]
pub struct ChangePlanRequest {
    pub plan: Plan,
}

#[derive(Serialize)]
pub struct BillingResponse {
    pub success: bool,
    pub plan: PlanDetails,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub usage: Usage,
}
