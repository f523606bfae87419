//! # Step Error Classification
//!
//! Turns a [`ServiceError`] observed on one attempt of a step into a retry
//! decision.
//!
//! The adapter that produced the error owns the transient/permanent call
//! through [`ServiceError::retryable`]; the classifier adds a category for
//! logging and combines it with the attempt budget so the retry loop has a
//! single place to ask "try again?".
//!
//! ```text
//! ServiceError + ErrorContext ──▶ ErrorClassifier ──▶ ErrorClassification
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ServiceError;

/// Context of the attempt that failed.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub step_name: &'a str,
    /// 1-based.
    pub attempt_number: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_category: ErrorCategory,
    /// Retry allowed by both the error and the remaining attempt budget.
    pub is_retryable: bool,
    pub is_final_attempt: bool,
    /// Stable code for log correlation.
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 401/403.
    Authorization,
    /// Any other 4xx the adapter rejected as bad input.
    Validation,
    Timeout,
    RateLimit,
    /// No response at all.
    Network,
    /// 5xx.
    ServerError,
    /// Non-retryable failure the adapter could not attribute to a status.
    Permanent,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Authorization => write!(f, "Authorization"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::RateLimit => write!(f, "Rate Limit"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::ServerError => write!(f, "Server Error"),
            ErrorCategory::Permanent => write!(f, "Permanent"),
        }
    }
}

pub trait ErrorClassifier: Send + Sync {
    fn classify_error(&self, error: &ServiceError, context: &ErrorContext<'_>)
        -> ErrorClassification;
}

/// Status-code based classifier used by the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn category_of(error: &ServiceError) -> ErrorCategory {
        match error.status_code {
            Some(401) | Some(403) => ErrorCategory::Authorization,
            Some(408) => ErrorCategory::Timeout,
            Some(429) => ErrorCategory::RateLimit,
            Some(500..=599) => ErrorCategory::ServerError,
            Some(_) => ErrorCategory::Validation,
            None if error.message.starts_with("timed out") => ErrorCategory::Timeout,
            None if error.retryable => ErrorCategory::Network,
            None => ErrorCategory::Permanent,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(
        &self,
        error: &ServiceError,
        context: &ErrorContext<'_>,
    ) -> ErrorClassification {
        let error_category = Self::category_of(error);
        let is_final_attempt = context.attempt_number >= context.max_attempts;
        let error_code = match error.status_code {
            Some(code) => format!("{}_{}", error.service.as_str().to_uppercase(), code),
            None => format!(
                "{}_{}",
                error.service.as_str().to_uppercase(),
                format!("{error_category:?}").to_uppercase()
            ),
        };

        ErrorClassification {
            error_category,
            is_retryable: error.retryable && !is_final_attempt,
            is_final_attempt,
            error_code,
        }
    }
}
