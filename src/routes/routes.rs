use actix_web::{middleware::from_fn, web};

use crate::auth::csrf::csrf_guard;

use super::health::health_handlers;

pub fn health_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_handlers::health))
        .route("/api/health", web::get().to(health_handlers::health));
}

use super::auth::auth_handlers;

pub fn auth_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/csrf", web::get().to(auth_handlers::csrf_token))
            .route("/check-username", web::post().to(auth_handlers::check_username))
            .route("/check-email", web::post().to(auth_handlers::check_email))
            .route("/register", web::post().to(auth_handlers::register))
            .route("/login", web::post().to(auth_handlers::login))
            .route("/refresh", web::post().to(auth_handlers::refresh))
            .route("/logout", web::post().to(auth_handlers::logout))
            .route("/me", web::get().to(auth_handlers::me))
            .route("/me", web::patch().to(auth_handlers::update_me))
            .route("/change-password", web::post().to(auth_handlers::change_password)),
    );
}

use super::onboarding::onboarding_handlers;

pub fn onboarding_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/onboarding")
            .route("", web::get().to(onboarding_handlers::get_onboarding))
            .route("/steps/{step}/complete", web::post().to(onboarding_handlers::complete_step))
            .route("/dismiss", web::post().to(onboarding_handlers::dismiss)),
    );
}

use super::member::member_handlers;

/// Token-addressed invitation routes, outside any workspace.
pub fn invitation_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invitations")
            .route("/{token}", web::get().to(member_handlers::preview_invitation))
            .route("/{token}/accept", web::post().to(member_handlers::accept_invitation)),
    );
}

use super::billing::billing_handlers;

pub fn billing_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/billing/plans", web::get().to(billing_handlers::list_plans));
}

// Everything below is mounted inside the single `/workspaces` scope.

use super::workspace::workspace_handlers;

pub fn workspace_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(workspace_handlers::list_workspaces))
        .route("", web::post().to(workspace_handlers::create_workspace))
        .route("/{workspace_id}", web::get().to(workspace_handlers::get_workspace))
        .route("/{workspace_id}", web::patch().to(workspace_handlers::rename_workspace))
        .route("/{workspace_id}", web::delete().to(workspace_handlers::delete_workspace))
        .route(
            "/{workspace_id}/transfer-ownership",
            web::post().to(workspace_handlers::transfer_ownership),
        );
}

pub fn member_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{workspace_id}/members", web::get().to(member_handlers::list_members))
        .route("/{workspace_id}/members/{user_id}", web::patch().to(member_handlers::change_role))
        .route("/{workspace_id}/members/{user_id}", web::delete().to(member_handlers::remove_member))
        .route("/{workspace_id}/leave", web::post().to(member_handlers::leave_workspace))
        .route("/{workspace_id}/invitations", web::get().to(member_handlers::list_invitations))
        .route("/{workspace_id}/invitations", web::post().to(member_handlers::create_invitation))
        .route(
            "/{workspace_id}/invitations/{invitation_id}",
            web::delete().to(member_handlers::revoke_invitation),
        );
}

use super::category::category_handlers;

pub fn category_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{workspace_id}/categories", web::get().to(category_handlers::list_categories))
        .route("/{workspace_id}/categories", web::post().to(category_handlers::create_category))
        .route(
            "/{workspace_id}/categories/order",
            web::put().to(category_handlers::reorder_categories),
        )
        .route(
            "/{workspace_id}/categories/{category_id}",
            web::patch().to(category_handlers::update_category),
        )
        .route(
            "/{workspace_id}/categories/{category_id}",
            web::delete().to(category_handlers::delete_category),
        );
}

use super::task::task_handlers;

pub fn task_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{workspace_id}/tasks", web::get().to(task_handlers::list_tasks))
        .route("/{workspace_id}/tasks", web::post().to(task_handlers::create_task))
        .route("/{workspace_id}/tasks/{task_id}", web::get().to(task_handlers::get_task))
        .route("/{workspace_id}/tasks/{task_id}", web::patch().to(task_handlers::update_task))
        .route("/{workspace_id}/tasks/{task_id}", web::delete().to(task_handlers::delete_task))
        .route("/{workspace_id}/tasks/{task_id}/move", web::post().to(task_handlers::move_task))
        .route(
            "/{workspace_id}/tasks/{task_id}/subtasks",
            web::get().to(task_handlers::list_subtasks),
        )
        .route(
            "/{workspace_id}/tasks/{task_id}/subtasks",
            web::post().to(task_handlers::create_subtask),
        )
        .route(
            "/{workspace_id}/tasks/{task_id}/assignees/{user_id}",
            web::put().to(task_handlers::add_assignee),
        )
        .route(
            "/{workspace_id}/tasks/{task_id}/assignees/{user_id}",
            web::delete().to(task_handlers::remove_assignee),
        );
}

use super::comment::comment_handlers;

pub fn comment_configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/{workspace_id}/tasks/{task_id}/comments",
        web::get().to(comment_handlers::list_comments),
    )
    .route(
        "/{workspace_id}/tasks/{task_id}/comments",
        web::post().to(comment_handlers::create_comment),
    )
    .route(
        "/{workspace_id}/comments/{comment_id}",
        web::patch().to(comment_handlers::update_comment),
    )
    .route(
        "/{workspace_id}/comments/{comment_id}",
        web::delete().to(comment_handlers::delete_comment),
    );
}

use super::activity::activity_handlers;

pub fn activity_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{workspace_id}/activity", web::get().to(activity_handlers::list_activity));
}

pub fn workspace_billing_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{workspace_id}/billing", web::get().to(billing_handlers::get_billing))
        .route("/{workspace_id}/billing", web::put().to(billing_handlers::change_plan))
        .route(
            "/{workspace_id}/billing/cancel",
            web::post().to(billing_handlers::cancel_subscription),
        );
}

/// The whole route table. Every `/api` route sits behind the CSRF guard.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health_configure).service(
        web::scope("/api")
            .wrap(from_fn(csrf_guard))
            .configure(auth_configure)
            .configure(onboarding_configure)
            .configure(invitation_configure)
            .configure(billing_configure)
            .service(
                web::scope("/workspaces")
                    .configure(workspace_configure)
                    .configure(member_configure)
                    .configure(category_configure)
                    .configure(task_configure)
                    .configure(comment_configure)
                    .configure(activity_configure)
                    .configure(workspace_billing_configure),
            ),
    );
}
