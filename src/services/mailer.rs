use async_trait::async_trait;
use log::info;
use thiserror::Error;

use super::retry::is_transient_status;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MailError {
    /// Worth another try later (timeouts, rate limits, provider outages).
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// Retrying will not help (bad address, rejected content).
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl MailError {
    /// Classifies a provider's HTTP status.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = format!("status {}: {}", status, detail.into());
        if is_transient_status(status) {
            MailError::Transient(detail)
        } else {
            MailError::Permanent(detail)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage<'_>) -> Result<(), MailError>;
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage<'_>) -> Result<(), MailError> {
        info!(
            "Email from {} to {}: {}\n{}",
            message.from, message.to, message.subject, message.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_retry_classes() {
        assert!(MailError::from_status(503, "unavailable").is_transient());
        assert!(!MailError::from_status(422, "bad address").is_transient());
        assert_eq!(
            MailError::from_status(400, "nope"),
            MailError::Permanent("status 400: nope".into())
        );
    }

    #[actix_web::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        let result = mailer
            .send(MailMessage {
                from: "a@example.com",
                to: "b@example.com",
                subject: "Hi",
                body: "Body",
            })
            .await;
        assert!(result.is_ok());
    }
}
