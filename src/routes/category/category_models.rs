use serde::{Deserialize, Serialize};

use crate::models::category::Category;

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// The complete new order of the workspace's categories.
#[derive(Deserialize)]
pub struct ReorderCategoriesRequest {
    pub category_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub success: bool,
    pub category: Category,
}

#[derive(Serialize)]
pub struct CategoryListResponse {
    pub success: bool,
    pub categories: Vec<Category>,
}
