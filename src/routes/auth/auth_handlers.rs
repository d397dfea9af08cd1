use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use chrono::Utc;
use log::{info, warn};
use sqlx::{MySqlConnection, MySqlPool};

use super::auth_models::{
    ChangePasswordRequest, CheckEmailRequest, CheckEmailResponse, CheckUsernameRequest,
    CheckUsernameResponse, CsrfResponse, LoginRequest, LoginResponse, MeResponse,
    RefreshResponse, RegisterRequest, RegisterResponse, UpdateProfileRequest,
};
use crate::{
    auth::{
        cookies::{csrf_cookie, refresh_cookie, removal_cookies, session_cookie},
        password::{hash_password, verify_password},
        tokens::generate_token,
        AuthUser, REFRESH_COOKIE,
    },
    config::AppConfig,
    error::ApiError,
    models::session::{RefreshToken, Session},
    models::user::User,
    routes::common_models::DefaultResponse,
    services::email_templates,
    validation,
};

/// Raw values for the three auth cookies of a freshly started session.
struct IssuedSession {
    session_id: String,
    refresh_token: String,
    csrf_token: String,
    remember_me: bool,
}

impl IssuedSession {
    fn set_cookies(&self, builder: &mut HttpResponseBuilder, config: &AppConfig) {
        let refresh_ttl = config.refresh_token_ttl(self.remember_me);
        builder
            .cookie(session_cookie(
                self.session_id.clone(),
                config.access_token_ttl(),
                config.cookie_secure,
            ))
            .cookie(refresh_cookie(
                self.refresh_token.clone(),
                refresh_ttl,
                config.cookie_secure,
            ))
            .cookie(csrf_cookie(
                self.csrf_token.clone(),
                refresh_ttl,
                config.cookie_secure,
            ));
    }
}

/// Creates an access session and a refresh token. `family_id` continues a
/// rotation chain; `None` starts a new one.
async fn issue_session(
    conn: &mut MySqlConnection,
    config: &AppConfig,
    user_id: i64,
    remember_me: bool,
    family_id: Option<&str>,
) -> Result<IssuedSession, sqlx::Error> {
    let session_id =
        Session::create(&mut *conn, user_id, config.access_token_ttl(), remember_me).await?;
    let refresh_token = RefreshToken::issue(
        &mut *conn,
        user_id,
        family_id,
        remember_me,
        config.refresh_token_ttl(remember_me),
    )
    .await?;
    Ok(IssuedSession {
        session_id,
        refresh_token,
        csrf_token: generate_token(),
        remember_me,
    })
}

/// 401 that also wipes the auth cookies, so the client falls back to login.
fn rejected_refresh(message: &str) -> HttpResponse {
    let mut builder = HttpResponse::Unauthorized();
    for cookie in removal_cookies() {
        builder.cookie(cookie);
    }
    builder.json(DefaultResponse {
        success: false,
        message: message.to_string(),
    })
}

// Check if username is unique
pub async fn check_username(
    pool: web::Data<MySqlPool>,
    req: web::Json<CheckUsernameRequest>,
) -> Result<HttpResponse, ApiError> {
    let username = validation::username(&req.username)?;
    info!("Received request to check username: {}", username);
    let is_unique = !User::name_taken(pool.get_ref(), &username).await?;
    Ok(HttpResponse::Ok().json(CheckUsernameResponse { is_unique }))
}

// Check if email is unique
pub async fn check_email(
    pool: web::Data<MySqlPool>,
    req: web::Json<CheckEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = validation::email(&req.email)?;
    info!("Received request to check email: {}", email);
    let is_unique = !User::email_taken(pool.get_ref(), &email).await?;
    Ok(HttpResponse::Ok().json(CheckEmailResponse { is_unique }))
}

pub async fn register(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let username = validation::username(&req.username)?;
    let email = validation::email(&req.email)?;
    validation::password(&req.password)?;
    info!("Received request to register user: {}", username);

    if User::name_taken(pool.get_ref(), &username).await? {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if User::email_taken(pool.get_ref(), &email).await? {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(&req.password)?;

    let mut tx = pool.begin().await?;
    let user_id = User::create(&mut *tx, &username, &email, &password_hash)
        .await
        .map_err(|e| ApiError::on_duplicate(e, "Username or email is already registered"))?;
    email_templates::welcome(&email, &username, &config.app_base_url)
        .enqueue(&mut *tx)
        .await?;
    tx.commit().await?;

    let user = User::find(pool.get_ref(), user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    info!("User {} registered successfully", username);
    Ok(HttpResponse::Created().json(RegisterResponse {
        success: true,
        message: "User registered successfully".into(),
        user: user.profile(),
    }))
}

pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let login = req.login.trim();
    info!("Received login request for user: {}", login);

    let user = match User::find_by_login(pool.get_ref(), login).await? {
        Some(user) if verify_password(&req.password, &user.password_hash) => user,
        _ => {
            info!("Invalid credentials for user: {}", login);
            return Err(ApiError::InvalidCredentials);
        }
    };

    let mut conn = pool.acquire().await?;
    let issued = issue_session(&mut conn, &config, user.user_id, req.remember_me, None).await?;

    info!("User {} logged in successfully", user.user_name);
    let mut response = HttpResponse::Ok();
    issued.set_cookies(&mut response, &config);
    Ok(response.json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        user: user.profile(),
        csrf_token: issued.csrf_token,
    }))
}

/// Rotates the refresh token. A token that was already rotated is a replay:
/// its whole family and every session of the user are revoked. A token
/// revoked by logout or a password change is only rejected.
pub async fn refresh(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let Some(token) = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        info!("Refresh token not found in cookies");
        return Ok(rejected_refresh("Login is needed"));
    };

    let mut tx = pool.begin().await?;
    let Some(stored) = RefreshToken::find_for_update(&mut *tx, &token).await? else {
        info!("Unknown refresh token presented");
        return Ok(rejected_refresh("Login is needed"));
    };

    let check = stored.check(Utc::now());
    let plan = check.plan();
    if plan.revoke_family {
        warn!(
            "Refresh token reuse detected for user {}; revoking family {}",
            stored.user_id, stored.family_id
        );
        RefreshToken::revoke_family(&mut *tx, &stored.family_id).await?;
    }
    if plan.end_all_sessions {
        Session::delete_for_user(&mut *tx, stored.user_id).await?;
    }
    if let Some(message) = plan.rejection {
        tx.commit().await?;
        info!("Refresh rejected for user {}: {:?}", stored.user_id, check);
        return Ok(rejected_refresh(message));
    }

    RefreshToken::rotate(&mut *tx, stored.refresh_token_id).await?;
    let issued = issue_session(
        &mut tx,
        &config,
        stored.user_id,
        stored.is_persistent,
        Some(&stored.family_id),
    )
    .await?;
    tx.commit().await?;

    let mut response = HttpResponse::Ok();
    issued.set_cookies(&mut response, &config);
    Ok(response.json(RefreshResponse {
        success: true,
        message: "Session refreshed".into(),
        csrf_token: issued.csrf_token,
    }))
}

/// Always succeeds and clears the cookies, even without a live session.
pub async fn logout(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    if let Some(cookie) = req.cookie(crate::auth::SESSION_COOKIE) {
        Session::delete(pool.get_ref(), cookie.value()).await?;
    }
    if let Some(cookie) = req.cookie(REFRESH_COOKIE) {
        if let Some(stored) = RefreshToken::find(pool.get_ref(), cookie.value()).await? {
            RefreshToken::revoke_family(pool.get_ref(), &stored.family_id).await?;
            info!("Logout successful for user {}", stored.user_id);
        }
    }

    let mut response = HttpResponse::Ok();
    for cookie in removal_cookies() {
        response.cookie(cookie);
    }
    Ok(response.json(DefaultResponse::ok("Logout successful")))
}

pub async fn csrf_token(config: web::Data<AppConfig>) -> HttpResponse {
    let token = generate_token();
    HttpResponse::Ok()
        .cookie(csrf_cookie(
            token.clone(),
            config.refresh_token_ttl(true),
            config.cookie_secure,
        ))
        .json(CsrfResponse { csrf_token: token })
}

pub async fn me(pool: web::Data<MySqlPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let user = User::find(pool.get_ref(), user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(MeResponse {
        user: user.profile(),
    }))
}

pub async fn update_me(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    req: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let display_name = match req.display_name.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(validation::name(name, "Display name", 100)?),
    };
    User::update_display_name(pool.get_ref(), user.user_id, display_name.as_deref()).await?;

    let user = User::find(pool.get_ref(), user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(MeResponse {
        user: user.profile(),
    }))
}

/// Signs out every other device and starts a fresh session for this one.
pub async fn change_password(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    auth: AuthUser,
    req: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::password(&req.new_password)?;
    let user = User::find(pool.get_ref(), auth.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !verify_password(&req.current_password, &user.password_hash) {
        info!("Wrong current password for user {}", user.user_name);
        return Err(ApiError::forbidden("Current password is incorrect"));
    }
    let password_hash = hash_password(&req.new_password)?;

    let mut tx = pool.begin().await?;
    User::update_password(&mut *tx, user.user_id, &password_hash).await?;
    Session::delete_for_user(&mut *tx, user.user_id).await?;
    RefreshToken::revoke_all_for_user(&mut *tx, user.user_id).await?;
    let issued = issue_session(&mut tx, &config, user.user_id, false, None).await?;
    tx.commit().await?;

    info!("Password changed for user {}", user.user_name);
    let mut response = HttpResponse::Ok();
    issued.set_cookies(&mut response, &config);
    Ok(response.json(RefreshResponse {
        success: true,
        message: "Password changed".into(),
        csrf_token: issued.csrf_token,
    }))
}
