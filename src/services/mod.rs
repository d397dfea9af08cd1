//! Background work that runs next to the HTTP server.

pub mod cleanup;
pub mod email_templates;
pub mod email_worker;
pub mod mailer;
pub mod reminder_worker;
pub mod retry;
