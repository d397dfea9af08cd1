use actix_web::{web, HttpResponse};
use sqlx::MySqlPool;

use super::activity_models::{ActivityQuery, ActivityResponse};
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        activity::{clamp_page_size, ActivityEntry},
        member::Membership,
    },
};

pub async fn list_activity(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let limit = clamp_page_size(query.limit);
    let activity = ActivityEntry::list(pool.get_ref(), workspace_id, query.before, limit).await?;
    let next_before = if activity.len() as i64 == limit {
        activity.last().map(|entry| entry.activity_id)
    } else {
        None
    };
    Ok(HttpResponse::Ok().json(ActivityResponse {
        success: true,
        activity,
        next_before,
    }))
}
