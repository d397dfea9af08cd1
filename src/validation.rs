//! Input checks shared by the handlers. Each returns the normalised value
//! or a 400 describing what was wrong.

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

pub fn username(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::bad_request("Username must be 3 to 32 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(name.to_string())
}

pub fn email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let invalid = || ApiError::bad_request("Invalid email address");

    if email.len() > 254 || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(email)
}

pub fn password(raw: &str) -> Result<(), ApiError> {
    let len = raw.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Trimmed, non-empty and at most `max` characters.
pub fn name(raw: &str, field: &str, max: usize) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

pub fn color(raw: &str) -> Result<String, ApiError> {
    let value = raw.trim();
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ApiError::bad_request("Color must look like #RRGGBB"));
    }
    Ok(value.to_uppercase())
}

pub fn comment_body(raw: &str) -> Result<String, ApiError> {
    name(raw, "Comment", 5000)
}

/// Empty descriptions are stored as NULL.
pub fn description(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > 10_000 => Err(ApiError::bad_request(
            "Description must be at most 10000 characters",
        )),
        Some(text) => Ok(Some(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert_eq!(username("  alice_01 ").unwrap(), "alice_01");
        assert!(username("al").is_err());
        assert!(username("has space").is_err());
        assert!(username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(email(" Bob@Example.COM ").unwrap(), "bob@example.com");
    }

    #[test]
    fn malformed_emails() {
        for bad in ["", "bob", "@example.com", "bob@", "bob@localhost", "a@b@c.com", "b ob@x.io", "bob@.com"] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_length_bounds() {
        assert!(password("short").is_err());
        assert!(password("longenough").is_ok());
        assert!(password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(name("  Roadmap ", "Workspace name", 100).unwrap(), "Roadmap");
        assert!(name("   ", "Workspace name", 100).is_err());
        assert!(name(&"n".repeat(101), "Workspace name", 100).is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(color("#a1b2c3").unwrap(), "#A1B2C3");
        assert!(color("a1b2c3").is_err());
        assert!(color("#a1b2c").is_err());
        assert!(color("#gggggg").is_err());
    }

    #[test]
    fn blank_description_becomes_none() {
        assert_eq!(description(Some("   ")).unwrap(), None);
        assert_eq!(description(Some(" notes ")).unwrap(), Some("notes".into()));
        assert_eq!(description(None).unwrap(), None);
    }
}
