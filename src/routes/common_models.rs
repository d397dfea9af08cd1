use serde::Serialize;

/// Body for mutations that return nothing but an outcome.
#[derive(Serialize)]
pub struct DefaultResponse {
    pub success: bool,
    pub message: String,
}

impl DefaultResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
