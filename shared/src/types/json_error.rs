use serde::{Deserialize, Serialize};

/// JSON body for every non-redirect failure the portal answers with.
///
/// Access denials never produce one of these; they redirect instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::new("NOT_FOUND", "Page not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::new("METHOD_NOT_ALLOWED", "Method not allowed")
    }

    pub fn internal() -> Self {
        Self::new("INTERNAL_ERROR", "An internal error occurred")
    }
}
