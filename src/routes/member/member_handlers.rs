use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};

use super::member_models::{
    AcceptInvitationResponse, ChangeRoleRequest, InvitationListResponse,
    InvitationPreviewResponse, InvitationResponse, InviteRequest, MemberListResponse,
};
use crate::{
    auth::{tokens::generate_token, AuthUser},
    config::AppConfig,
    error::ApiError,
    models::{
        activity::NewActivity,
        assignee::Assignment,
        invitation::{Invitation, InvitationStatus},
        member::{check_invite_role, check_removal, check_role_change, MemberRole, Membership},
        onboarding::{Onboarding, OnboardingStep},
        subscription::{Subscription, Usage},
        user::User,
        workspace::Workspace,
    },
    routes::common_models::DefaultResponse,
    services::email_templates,
    validation,
};

/// Removes a member together with their task assignments in the workspace.
async fn drop_member(
    conn: &mut MySqlConnection,
    workspace_id: i64,
    actor_id: i64,
    user_id: i64,
    action: &'static str,
) -> Result<(), sqlx::Error> {
    Assignment::remove_for_member(&mut *conn, workspace_id, user_id).await?;
    Membership::remove(&mut *conn, workspace_id, user_id).await?;
    NewActivity::new(workspace_id, actor_id, action)
        .entity(user_id)
        .record(&mut *conn)
        .await
}

pub async fn list_members(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    let members = Membership::list(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(MemberListResponse {
        success: true,
        members,
    }))
}

pub async fn change_role(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<ChangeRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, member_id) = path.into_inner();
    let actor = Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let target = Membership::role_of(&mut *tx, workspace_id, member_id)
        .await?
        .ok_or(ApiError::NotFound("Member"))?;
    check_role_change(actor, target, req.role).map_err(ApiError::forbidden)?;
    if target != req.role {
        Membership::set_role(&mut *tx, workspace_id, member_id, req.role).await?;
        NewActivity::new(workspace_id, user.user_id, "member.role_changed")
            .entity(member_id)
            .details(json!({ "from": target, "to": req.role }))
            .record(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(
        "User {} set role of user {} in workspace {} to {}",
        user.user_id, member_id, workspace_id, req.role
    );
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Role updated")))
}

pub async fn remove_member(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, member_id) = path.into_inner();
    if member_id == user.user_id {
        return leave(pool.get_ref(), workspace_id, user.user_id).await;
    }
    let actor = Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let target = Membership::role_of(&mut *tx, workspace_id, member_id)
        .await?
        .ok_or(ApiError::NotFound("Member"))?;
    check_removal(actor, target).map_err(ApiError::forbidden)?;
    drop_member(&mut tx, workspace_id, user.user_id, member_id, "member.removed").await?;
    tx.commit().await?;

    info!("User {} removed user {} from workspace {}", user.user_id, member_id, workspace_id);
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Member removed")))
}

/// Any member except the owner may leave.
async fn leave(pool: &MySqlPool, workspace_id: i64, user_id: i64) -> Result<HttpResponse, ApiError> {
    let role = Membership::require(pool, workspace_id, user_id).await?;
    if role == MemberRole::Owner {
        return Err(ApiError::conflict(
            "The owner must transfer ownership before leaving",
        ));
    }

    let mut tx = pool.begin().await?;
    drop_member(&mut tx, workspace_id, user_id, user_id, "member.left").await?;
    tx.commit().await?;

    info!("User {} left workspace {}", user_id, workspace_id);
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Left workspace")))
}

pub async fn leave_workspace(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    leave(pool.get_ref(), path.into_inner(), user.user_id).await
}

pub async fn create_invitation(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<InviteRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    let email = validation::email(&req.email)?;
    let actor =
        Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Admin)
            .await?;
    check_invite_role(actor, req.role).map_err(ApiError::forbidden)?;

    let inviter = User::find(pool.get_ref(), user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let plan = Subscription::lock_plan(&mut tx, workspace_id).await?.details();
    if Membership::email_is_member(&mut *tx, workspace_id, &email).await? {
        return Err(ApiError::conflict("This user is already a member"));
    }
    if Invitation::pending_for_email(&mut *tx, workspace_id, &email, now).await? {
        return Err(ApiError::conflict("An invitation is already pending for this email"));
    }
    let workspace = Workspace::find(&mut *tx, workspace_id)
        .await?
        .ok_or(ApiError::NotFound("Workspace"))?;
    let usage = Usage::load(&mut tx, workspace_id, now).await?;
    if !plan.allows_another_seat(&usage) {
        return Err(ApiError::PlanLimit(format!(
            "The {} plan allows {} members including pending invitations",
            plan.name,
            plan.max_members.unwrap_or_default()
        )));
    }

    let token = generate_token();
    let invitation_id = Invitation::create(
        &mut *tx,
        workspace_id,
        user.user_id,
        &email,
        req.role,
        &token,
        now + config.invitation_ttl(),
    )
    .await?;
    email_templates::invitation(
        &email,
        &workspace.workspace_name,
        inviter.shown_name(),
        req.role,
        &config.invitation_url(&token),
    )
    .enqueue(&mut *tx)
    .await?;
    NewActivity::new(workspace_id, user.user_id, "invitation.created")
        .entity(invitation_id)
        .details(json!({ "email": email, "role": req.role }))
        .record(&mut *tx)
        .await?;
    Onboarding::complete(&mut *tx, user.user_id, OnboardingStep::InviteTeammate).await?;
    let invitation = Invitation::find(&mut *tx, workspace_id, invitation_id)
        .await?
        .ok_or(ApiError::NotFound("Invitation"))?;
    tx.commit().await?;

    info!("User {} invited {} to workspace {}", user.user_id, email, workspace_id);
    Ok(HttpResponse::Created().json(InvitationResponse {
        success: true,
        invitation,
    }))
}

pub async fn list_invitations(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Admin).await?;
    let invitations = Invitation::list_pending(pool.get_ref(), workspace_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(InvitationListResponse {
        success: true,
        invitations,
    }))
}

pub async fn revoke_invitation(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, invitation_id) = path.into_inner();
    Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Admin).await?;

    let mut tx = pool.begin().await?;
    let invitation = Invitation::find(&mut *tx, workspace_id, invitation_id)
        .await?
        .ok_or(ApiError::NotFound("Invitation"))?;
    if invitation.status != InvitationStatus::Pending {
        return Err(ApiError::conflict("Only pending invitations can be revoked"));
    }
    Invitation::set_status(&mut *tx, invitation_id, InvitationStatus::Revoked).await?;
    NewActivity::new(workspace_id, user.user_id, "invitation.revoked")
        .entity(invitation_id)
        .details(json!({ "email": invitation.email }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Invitation revoked")))
}

/// Public: lets the invitee see what they are joining before logging in.
pub async fn preview_invitation(
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let invitation = Invitation::preview(pool.get_ref(), &path)
        .await?
        .ok_or(ApiError::NotFound("Invitation"))?;
    Ok(HttpResponse::Ok().json(InvitationPreviewResponse {
        success: true,
        invitation,
    }))
}

pub async fn accept_invitation(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let account = User::find(pool.get_ref(), user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let invitation = Invitation::find_by_token(&mut *tx, &path)
        .await?
        .ok_or(ApiError::NotFound("Invitation"))?;
    if let Some(reason) = invitation.unusable_reason(now) {
        return Err(ApiError::conflict(reason));
    }
    if !invitation.email.eq_ignore_ascii_case(&account.user_email) {
        info!(
            "User {} tried to accept invitation {} sent to another address",
            user.user_id, invitation.invitation_id
        );
        return Err(ApiError::forbidden(
            "This invitation was sent to a different email address",
        ));
    }
    let workspace_id = invitation.workspace_id;
    let plan = Subscription::lock_plan(&mut tx, workspace_id).await?.details();
    if Membership::role_of(&mut *tx, workspace_id, user.user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("You are already a member of this workspace"));
    }

    let usage = Usage::load(&mut tx, workspace_id, now).await?;
    if !plan.allows_joining(&usage) {
        return Err(ApiError::PlanLimit(format!(
            "This workspace has reached the {} plan member limit",
            plan.name
        )));
    }

    Membership::add(&mut *tx, workspace_id, user.user_id, invitation.role).await?;
    Invitation::set_status(&mut *tx, invitation.invitation_id, InvitationStatus::Accepted).await?;
    NewActivity::new(workspace_id, user.user_id, "member.joined")
        .entity(user.user_id)
        .details(json!({ "role": invitation.role, "invitation_id": invitation.invitation_id }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("User {} joined workspace {}", user.user_id, workspace_id);
    Ok(HttpResponse::Ok().json(AcceptInvitationResponse {
        success: true,
        workspace_id,
        role: invitation.role,
    }))
}
