use serde::{Deserialize, Serialize};

use crate::models::user::UserProfile;

// Username check request and response
#[derive(Deserialize)]
pub struct CheckUsernameRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub is_unique: bool,
}


// Email check request and response
#[derive(Deserialize)]
pub struct CheckEmailRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct CheckEmailResponse {
    pub is_unique: bool,
}


// Registration request and response
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}


// Login request and response
#[derive(Deserialize)]
pub struct LoginRequest {
    /// User name or email address.
    #[serde(alias = "username")]
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
    pub csrf_token: String,
}


// Token refresh and CSRF
#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub csrf_token: String,
}

#[derive(Serialize)]
pub struct CsrfResponse {
    pub csrf_token: String,
}


// Current user
#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
