//! Structured JSON logging for the Lambda binaries.

use tracing_subscriber::EnvFilter;

/// Maps a `LOG_LEVEL` value (which may use the `WARNING`/`CRITICAL` spellings)
/// to a tracing filter directive.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        "OFF" => "off",
        _ => "info",
    }
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init(log_level: &str) {
    let filter = EnvFilter::new(filter_directive(log_level));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_current_span(false)
        .try_init();
}
