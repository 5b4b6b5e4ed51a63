use serde::{Deserialize, Serialize};

/// JSON error envelope returned by every failing route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(message: String, code: String) -> Self {
        Self { message, code }
    }
}
