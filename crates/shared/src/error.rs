use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected locally before any request was issued.
    Validation,
    /// The server could not be reached or the exchange broke mid-flight.
    Transport,
    /// The server answered with a non-2xx status.
    Server,
}

/// Normalized failure surfaced to the view layer through a resource's
/// `error` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: None,
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_field_errors(mut self, field_errors: BTreeMap<String, String>) -> Self {
        self.field_errors = (!field_errors.is_empty()).then_some(field_errors);
        self
    }

    pub fn validation(field_errors: BTreeMap<String, String>) -> Self {
        Self::new("Validation failed").with_field_errors(field_errors)
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .as_ref()
            .and_then(|errors| errors.get(field))
            .map(String::as_str)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.status_code {
            Some(_) => ErrorCategory::Server,
            None if self.field_errors.is_some() => ErrorCategory::Validation,
            None => ErrorCategory::Transport,
        }
    }
}
