use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlExecutor, MySqlPool};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub onboarding_dismissed_at: Option<DateTime<Utc>>,
}

/// What the API exposes about a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "user_id, user_name, user_email, display_name, password_hash, \
                            created_at, onboarding_dismissed_at";

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }

    /// Name shown in emails: display name when set, user name otherwise.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_name)
    }

    pub async fn find(pool: &MySqlPool, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Login accepts either the user name or the email address.
    pub async fn find_by_login(pool: &MySqlPool, login: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_name = ? OR user_email = ? LIMIT 1",
            USER_COLUMNS
        ))
        .bind(login)
        .bind(login.to_lowercase())
        .fetch_optional(pool)
        .await
    }

    pub async fn name_taken(pool: &MySqlPool, user_name: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE user_name = ?")
            .bind(user_name)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn email_taken(pool: &MySqlPool, email: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE user_email = ?")
            .bind(email)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn create<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (user_name, user_email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_name)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn update_display_name(
        pool: &MySqlPool,
        user_id: i64,
        display_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET display_name = ? WHERE user_id = ?")
            .bind(display_name)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_password<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(display_name: Option<&str>) -> User {
        User {
            user_id: 7,
            user_name: "alice".into(),
            user_email: "alice@example.com".into(),
            display_name: display_name.map(str::to_string),
            password_hash: "$2b$12$secret".into(),
            created_at: Utc::now(),
            onboarding_dismissed_at: None,
        }
    }

    #[test]
    fn profile_omits_password_hash() {
        let json = serde_json::to_value(user(None).profile()).unwrap();
        assert_eq!(json["user_name"], "alice");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn shown_name_prefers_display_name() {
        assert_eq!(user(Some("Alice A.")).shown_name(), "Alice A.");
        assert_eq!(user(None).shown_name(), "alice");
    }
}
