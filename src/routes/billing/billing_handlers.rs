use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde_json::json;
use sqlx::MySqlPool;

use super::billing_models::{BillingResponse, ChangePlanRequest, PlanCatalogResponse};
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        activity::NewActivity,
        member::{MemberRole, Membership},
        subscription::{Plan, Subscription, SubscriptionStatus, Usage},
        user::User,
        workspace::Workspace,
    },
    services::email_templates,
};

async fn billing_response(pool: &MySqlPool, workspace_id: i64) -> Result<BillingResponse, ApiError> {
    let mut conn = pool.acquire().await?;
    let usage = Usage::load(&mut conn, workspace_id, Utc::now()).await?;
    let subscription = Subscription::find(&mut *conn, workspace_id).await?;
    let (plan, status, current_period_end) = match subscription {
        Some(s) => (s.plan, s.status, s.current_period_end),
        None => (Plan::Free, SubscriptionStatus::Active, None),
    };
    Ok(BillingResponse {
        success: true,
        plan: plan.details(),
        status,
        current_period_end,
        usage,
    })
}

/// Switches plans after checking the workspace fits the new limits.
async fn switch_plan(
    pool: &MySqlPool,
    user: &AuthUser,
    workspace_id: i64,
    plan: Plan,
    status: SubscriptionStatus,
) -> Result<(), ApiError> {
    Membership::require_role(pool, workspace_id, user.user_id, MemberRole::Owner).await?;
    let owner = User::find(pool, user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let mut tx = pool.begin().await?;
    let workspace = Workspace::find(&mut *tx, workspace_id)
        .await?
        .ok_or(ApiError::NotFound("Workspace"))?;
    let previous = Subscription::lock_plan(&mut tx, workspace_id).await?;
    let usage = Usage::load(&mut tx, workspace_id, Utc::now()).await?;
    let details = plan.details();
    if let Some(reason) = details.overage(&usage) {
        return Err(ApiError::conflict(reason));
    }

    Subscription::set_plan(&mut *tx, workspace_id, plan, status).await?;
    NewActivity::new(workspace_id, user.user_id, "billing.plan_changed")
        .entity(workspace_id)
        .details(json!({ "from": previous, "to": plan, "status": status }))
        .record(&mut *tx)
        .await?;
    email_templates::plan_changed(&owner.user_email, &workspace.workspace_name, details.name)
        .enqueue(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        "Workspace {} moved from the {} plan to the {} plan ({})",
        workspace_id, previous, plan, status
    );
    Ok(())
}

pub async fn list_plans() -> HttpResponse {
    HttpResponse::Ok().json(PlanCatalogResponse {
        success: true,
        plans: Plan::catalog(),
    })
}

pub async fn get_billing(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    let response = billing_response(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn change_plan(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<ChangePlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    switch_plan(pool.get_ref(), &user, workspace_id, req.plan, SubscriptionStatus::Active).await?;
    let response = billing_response(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn cancel_subscription(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    switch_plan(pool.get_ref(), &user, workspace_id, Plan::Free, SubscriptionStatus::Canceled)
        .await?;
    let response = billing_response(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(response))
}
