use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;
use sqlx::MySqlPool;

use super::category_models::{
    CategoryListResponse, CategoryResponse, CreateCategoryRequest, ReorderCategoriesRequest,
    UpdateCategoryRequest,
};
use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{
        activity::NewActivity,
        category::{Category, DEFAULT_COLOR},
        member::{MemberRole, Membership},
        onboarding::{Onboarding, OnboardingStep},
        task::Task,
    },
    ordering,
    routes::common_models::DefaultResponse,
    validation,
};

const DUPLICATE_NAME: &str = "A category with this name already exists";

pub async fn list_categories(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    let categories = Category::list(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(CategoryListResponse {
        success: true,
        categories,
    }))
}

pub async fn create_category(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    let name = validation::name(&req.name, "Category name", 100)?;
    let color = match req.color.as_deref() {
        Some(color) => validation::color(color)?,
        None => DEFAULT_COLOR.to_string(),
    };
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let category_id = Category::create(&mut tx, workspace_id, &name, &color)
        .await
        .map_err(|e| ApiError::on_duplicate(e, DUPLICATE_NAME))?;
    NewActivity::new(workspace_id, user.user_id, "category.created")
        .entity(category_id)
        .details(json!({ "name": name }))
        .record(&mut *tx)
        .await?;
    Onboarding::complete(&mut *tx, user.user_id, OnboardingStep::CreateCategory).await?;
    let category = Category::find(&mut *tx, workspace_id, category_id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    tx.commit().await?;

    info!("Category {} created in workspace {}", category_id, workspace_id);
    Ok(HttpResponse::Created().json(CategoryResponse {
        success: true,
        category,
    }))
}

pub async fn update_category(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, category_id) = path.into_inner();
    let name = req
        .name
        .as_deref()
        .map(|name| validation::name(name, "Category name", 100))
        .transpose()?;
    let color = req.color.as_deref().map(validation::color).transpose()?;
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let current = Category::find(&mut *tx, workspace_id, category_id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    let name = name.unwrap_or(current.category_name);
    let color = color.unwrap_or(current.color);
    Category::update(&mut *tx, category_id, &name, &color)
        .await
        .map_err(|e| ApiError::on_duplicate(e, DUPLICATE_NAME))?;
    NewActivity::new(workspace_id, user.user_id, "category.updated")
        .entity(category_id)
        .details(json!({ "name": name, "color": color }))
        .record(&mut *tx)
        .await?;
    let category = Category::find(&mut *tx, workspace_id, category_id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(CategoryResponse {
        success: true,
        category,
    }))
}

/// Admin only, since every task in the column loses its category.
/// Tasks in the category move to the bottom of the uncategorised column.
pub async fn delete_category(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, category_id) = path.into_inner();
    Membership::require_role(pool.get_ref(), workspace_id, user.user_id, MemberRole::Admin).await?;

    let mut tx = pool.begin().await?;
    let category = Category::find(&mut *tx, workspace_id, category_id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    let orphaned = Task::column_ids_for_update(&mut tx, workspace_id, Some(category_id)).await?;
    let uncategorised = Task::column_ids_for_update(&mut tx, workspace_id, None).await?;
    Task::set_column(&mut tx, None, &ordering::append_column(&uncategorised, &orphaned)).await?;
    Category::delete(&mut *tx, category_id).await?;
    NewActivity::new(workspace_id, user.user_id, "category.deleted")
        .entity(category_id)
        .details(json!({ "name": category.category_name }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Category {} deleted from workspace {}", category_id, workspace_id);
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Category deleted")))
}

pub async fn reorder_categories(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<ReorderCategoriesRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let current = Category::ids_for_update(&mut tx, workspace_id).await?;
    if !ordering::is_permutation(&current, &req.category_ids) {
        return Err(ApiError::bad_request(
            "Category order must list every category of the workspace exactly once",
        ));
    }
    Category::set_positions(&mut tx, &req.category_ids).await?;
    NewActivity::new(workspace_id, user.user_id, "category.reordered")
        .details(json!({ "category_ids": req.category_ids }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    let categories = Category::list(pool.get_ref(), workspace_id).await?;
    Ok(HttpResponse::Ok().json(CategoryListResponse {
        success: true,
        categories,
    }))
}
