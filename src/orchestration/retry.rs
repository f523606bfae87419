//! Bounded retry of a single step.
//!
//! A step with `retry_attempts = k` is attempted at most `k + 1` times. Each
//! attempt runs under the step timeout; an elapsed timeout counts as a
//! retryable failure. Non-retryable failures end the loop immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::error_classifier::{ErrorClassifier, ErrorContext, StandardErrorClassifier};
use crate::config::{BackoffStrategy, OrchestratorConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::services::ServiceKind;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffStrategy,
    pub step_timeout: Duration,
    pub log_retries: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
            backoff: config.backoff,
            step_timeout: config.step_timeout(),
            log_retries: config.enable_logging,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.retry_delay,
            BackoffStrategy::Exponential {
                multiplier,
                max_delay_ms,
            } => {
                let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
                let scaled_ms = self.retry_delay.as_millis() as f64 * multiplier.powi(exponent);
                if scaled_ms.is_finite() && scaled_ms < max_delay_ms as f64 {
                    Duration::from_millis(scaled_ms.round() as u64)
                } else {
                    Duration::from_millis(max_delay_ms)
                }
            }
        }
    }

    /// Run `call` until it succeeds, fails permanently or exhausts the
    /// attempt budget. Returns the last error on failure.
    pub async fn execute<T, F, Fut>(
        &self,
        service: ServiceKind,
        step: &str,
        mut call: F,
    ) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let classifier = StandardErrorClassifier::new();
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match timeout(self.step_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(elapsed) => ServiceError::timeout(
                    service,
                    step,
                    self.step_timeout.as_millis() as u64,
                )
                .with_source(elapsed),
            };

            let classification = classifier.classify_error(
                &error,
                &ErrorContext {
                    step_name: step,
                    attempt_number: attempt,
                    max_attempts,
                },
            );

            if !classification.is_retryable {
                if self.log_retries {
                    warn!(
                        service = %service,
                        step = step,
                        attempt = attempt,
                        category = %classification.error_category,
                        error_code = %classification.error_code,
                        error = %error,
                        "Step failed"
                    );
                }
                return Err(error);
            }

            let delay = self.delay_before_retry(attempt);
            if self.log_retries {
                debug!(
                    service = %service,
                    step = step,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying step"
                );
            }
            sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}
