use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;
use sqlx::MySqlPool;

use super::comment_models::{CommentListResponse, CommentRequest, CommentResponse};
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        activity::NewActivity,
        comment::Comment,
        member::{MemberRole, Membership},
        task::Task,
    },
    routes::common_models::DefaultResponse,
    validation,
};

pub async fn list_comments(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    Task::find(pool.get_ref(), workspace_id, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;

    let comments = Comment::list_for_task(pool.get_ref(), task_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(CommentListResponse {
        success: true,
        comments,
    }))
}

pub async fn create_comment(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    let body = validation::comment_body(&req.body)?;
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    Task::find(&mut *tx, workspace_id, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    let comment_id = Comment::create(&mut *tx, task_id, user.user_id, &body).await?;
    NewActivity::new(workspace_id, user.user_id, "comment.created")
        .entity(comment_id)
        .details(json!({ "task_id": task_id }))
        .record(&mut *tx)
        .await?;
    let comment = Comment::find(&mut *tx, workspace_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    tx.commit().await?;

    info!("User {} commented on task {}", user.user_id, task_id);
    Ok(HttpResponse::Created().json(CommentResponse {
        success: true,
        comment: comment.into(),
    }))
}

/// Only the author may edit a comment.
pub async fn update_comment(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, comment_id) = path.into_inner();
    let body = validation::comment_body(&req.body)?;
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let comment = Comment::find(&mut *tx, workspace_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    if comment.author_id != user.user_id {
        return Err(ApiError::forbidden("Only the author can edit this comment"));
    }
    Comment::update_body(&mut *tx, comment_id, &body).await?;
    NewActivity::new(workspace_id, user.user_id, "comment.edited")
        .entity(comment_id)
        .details(json!({ "task_id": comment.task_id }))
        .record(&mut *tx)
        .await?;
    let comment = Comment::find(&mut *tx, workspace_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(CommentResponse {
        success: true,
        comment: comment.into(),
    }))
}

/// The author or any admin may delete.
pub async fn delete_comment(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, comment_id) = path.into_inner();
    let role = Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let comment = Comment::find(&mut *tx, workspace_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    if comment.author_id != user.user_id && !role.at_least(MemberRole::Admin) {
        return Err(ApiError::forbidden("Only the author or an admin can delete this comment"));
    }
    Comment::delete(&mut *tx, comment_id).await?;
    NewActivity::new(workspace_id, user.user_id, "comment.deleted")
        .entity(comment_id)
        .details(json!({ "task_id": comment.task_id }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Comment deleted")))
}
