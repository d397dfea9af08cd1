use std::{future::Future, pin::Pin};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use log::info;
use sqlx::MySqlPool;

use super::SESSION_COOKIE;
use crate::{error::ApiError, models::session::Session};

/// The caller behind a valid `session_id` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let pool = req.app_data::<web::Data<MySqlPool>>().cloned();

        Box::pin(async move {
            let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
                info!("Session ID not found in cookies");
                return Err(ApiError::Unauthorized);
            };
            let pool = pool.ok_or_else(|| ApiError::Internal("database pool is not registered".into()))?;

            match Session::find_active(pool.get_ref(), &session_id, Utc::now()).await? {
                Some(session) => Ok(AuthUser {
                    user_id: session.user_id,
                }),
                None => {
                    info!("Invalid or expired session ID");
                    Err(ApiError::Unauthorized)
                }
            }
        })
    }
}
