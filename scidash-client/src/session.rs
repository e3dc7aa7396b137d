//! Per-client session state
//!
//! Holds the bearer token, host metadata, accumulated errors and the last
//! merged payload. Owned by one [`crate::ScidashClient`]; never shared.

use crate::record::CanonicalRecord;

#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    /// Bearer token from the last successful login
    pub token: Option<String>,
    /// Build descriptor injected into every payload's `test_instance`
    pub build_info: String,
    /// Hostname injected into every payload's `test_instance`
    pub hostname: Option<String>,
    /// Validation messages and error response bodies, oldest first
    pub errors: Vec<String>,
    /// Last merged payload; `None` after a failed merge
    pub payload: Option<CanonicalRecord>,
}

impl ClientSession {
    pub fn new(build_info: impl Into<String>, hostname: Option<String>) -> Self {
        Self {
            build_info: build_info.into(),
            hostname,
            ..Self::default()
        }
    }

    /// Value of the `Authorization` header for uploads
    pub fn authorization(&self) -> String {
        format!("JWT {}", self.token.as_deref().unwrap_or_default())
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
