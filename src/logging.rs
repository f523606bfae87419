//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestrator.
//!
//! The level comes from `RUST_LOG` when set, otherwise from the deployment
//! environment (`CROSSFLOW_ENV`, falling back to `APP_ENV`). Output is human
//! readable by default and JSON when `CROSSFLOW_LOG_FORMAT=json` or in
//! production.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Later calls are no-ops,
/// and an already installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = use_json_format(&environment);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("CROSSFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        "test" => "warn".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format(environment: &str) -> bool {
    match std::env::var("CROSSFLOW_LOG_FORMAT") {
        Ok(format) => format.eq_ignore_ascii_case("json"),
        Err(_) => environment == "production",
    }
}

/// Log the outcome of one composite operation.
pub fn log_composite_operation(
    operation: &str,
    operation_id: Uuid,
    status: &str,
    duration_ms: f64,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        operation_id = %operation_id,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 COMPOSITE_OPERATION"
    );
}

/// Log a composite operation failure with its service errors.
pub fn log_operation_error(operation: &str, operation_id: Uuid, error: &str, context: Option<&str>) {
    tracing::error!(
        operation = %operation,
        operation_id = %operation_id,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ OPERATION_ERROR"
    );
}
