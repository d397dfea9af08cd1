use actix_web::{web, HttpResponse};
use log::info;
use sqlx::MySqlPool;

use super::onboarding_models::OnboardingResponse;
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::onboarding::{Onboarding, OnboardingStatus, OnboardingStep},
    models::user::User,
};

async fn load_status(pool: &MySqlPool, user_id: i64) -> Result<OnboardingStatus, ApiError> {
    let user = User::find(pool, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let done = Onboarding::completed_steps(pool, user_id).await?;
    Ok(OnboardingStatus::build(&done, user.onboarding_dismissed_at))
}

pub async fn get_onboarding(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let onboarding = load_status(pool.get_ref(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(OnboardingResponse {
        success: true,
        onboarding,
    }))
}

pub async fn complete_step(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let step: OnboardingStep = path.parse()?;
    info!("User {} completed onboarding step {}", user.user_id, step);
    Onboarding::complete(pool.get_ref(), user.user_id, step).await?;

    let onboarding = load_status(pool.get_ref(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(OnboardingResponse {
        success: true,
        onboarding,
    }))
}

pub async fn dismiss(pool: web::Data<MySqlPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    Onboarding::dismiss(pool.get_ref(), user.user_id).await?;
    let onboarding = load_status(pool.get_ref(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(OnboardingResponse {
        success: true,
        onboarding,
    }))
}
