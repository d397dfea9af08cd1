use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;
use sqlx::MySqlPool;

use super::workspace_models::{
    TransferOwnershipRequest, WorkspaceListResponse, WorkspaceNameRequest, WorkspaceResponse,
};
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        activity::NewActivity,
        member::{MemberRole, Membership},
        onboarding::{Onboarding, OnboardingStep},
        subscription::Subscription,
        workspace::Workspace,
    },
    routes::common_models::DefaultResponse,
    validation,
};

async fn workspace_response(
    pool: &MySqlPool,
    workspace_id: i64,
    role: MemberRole,
) -> Result<WorkspaceResponse, ApiError> {
    let workspace = Workspace::find(pool, workspace_id)
        .await?
        .ok_or(ApiError::NotFound("Workspace"))?;
    let plan = Subscription::plan_of(pool, workspace_id).await?;
    Ok(WorkspaceResponse {
        success: true,
        workspace,
        role,
        plan,
    })
}

pub async fn list_workspaces(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let workspaces = Workspace::list_for_user(pool.get_ref(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(WorkspaceListResponse {
        success: true,
        workspaces,
    }))
}

pub async fn create_workspace(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    req: web::Json<WorkspaceNameRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = validation::name(&req.name, "Workspace name", 100)?;
    info!("User {} creating workspace {}", user.user_id, name);

    let mut tx = pool.begin().await?;
    let workspace_id = Workspace::create(&mut *tx, &name, user.user_id).await?;
    Membership::add(&mut *tx, workspace_id, user.user_id, MemberRole::Owner).await?;
    Subscription::create_free(&mut *tx, workspace_id).await?;
    NewActivity::new(workspace_id, user.user_id, "workspace.created")
        .entity(workspace_id)
        .details(json!({ "name": name }))
        .record(&mut *tx)
        .await?;
    Onboarding::complete(&mut *tx, user.user_id, OnboardingStep::CreateWorkspace).await?;
    tx.commit().await?;

    let response = workspace_response(pool.get_ref(), workspace_id, MemberRole::Owner).await?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn get_workspace(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    let role = Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    let response = workspace_response(pool.get_ref(), workspace_id, role).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn rename_workspace(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<WorkspaceNameRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    let name = validation::name(&req.name, "Workspace name", 100)?;
    let role =
        Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Admin)
            .await?;

    let mut tx = pool.begin().await?;
    let current = Workspace::find(&mut *tx, workspace_id)
        .await?
        .ok_or(ApiError::NotFound("Workspace"))?;
    Workspace::rename(&mut *tx, workspace_id, &name).await?;
    NewActivity::new(workspace_id, user.user_id, "workspace.renamed")
        .entity(workspace_id)
        .details(json!({ "from": current.workspace_name, "to": name }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    let response = workspace_response(pool.get_ref(), workspace_id, role).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Owner only. Members, tasks, categories and the activity log go with it.
pub async fn delete_workspace(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Owner).await?;

    Workspace::delete(pool.get_ref(), workspace_id).await?;
    info!("Workspace {} deleted by user {}", workspace_id, user.user_id);
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Workspace deleted")))
}

/// Hands the workspace to another member; the previous owner stays on as admin.
pub async fn transfer_ownership(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<TransferOwnershipRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Owner).await?;
    if req.user_id == user.user_id {
        return Err(ApiError::conflict("You already own this workspace"));
    }

    let mut tx = pool.begin().await?;
    if Membership::role_of(&mut *tx, workspace_id, req.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Member"));
    }
    Membership::set_role(&mut *tx, workspace_id, req.user_id, MemberRole::Owner).await?;
    Membership::set_role(&mut *tx, workspace_id, user.user_id, MemberRole::Admin).await?;
    Workspace::set_owner(&mut *tx, workspace_id, req.user_id).await?;
    NewActivity::new(workspace_id, user.user_id, "workspace.ownership_transferred")
        .entity(workspace_id)
        .details(json!({ "from_user_id": user.user_id, "to_user_id": req.user_id }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        "Workspace {} transferred from user {} to user {}",
        workspace_id, user.user_id, req.user_id
    );
    let response = workspace_response(pool.get_ref(), workspace_id, MemberRole::Admin).await?;
    Ok(HttpResponse::Ok().json(response))
}
