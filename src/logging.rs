//! # Logging
//!
//! Environment-aware console logging on stderr using the tracing ecosystem.
//! Stdout is left to the client's per-send summary lines.
//!
//! Level resolution, first match wins:
//! 1. `RUST_LOG`
//! 2. `-v` / `-vv` on the command line (debug / trace)
//! 3. `WORKSHOP_ENV` or `APP_ENV` (`production` logs at info, anything else at debug)
//!
//! `WORKSHOP_LOG_FORMAT=json` switches to one JSON object per line.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process
///
/// A subscriber installed earlier (by a test harness, for instance) is left in
/// place.
pub fn init_structured_logging(verbosity: u8) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let rust_log = std::env::var("RUST_LOG").ok();
        let filter = resolve_filter(rust_log.as_deref(), verbosity, &environment);
        let json = use_json_format(std::env::var("WORKSHOP_LOG_FORMAT").ok().as_deref());
        let use_ansi = !json && IsTerminal::is_terminal(&std::io::stderr());

        let initialized = if json {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_filter(EnvFilter::new(&filter)),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true)
                        .with_ansi(use_ansi)
                        .with_filter(EnvFilter::new(&filter)),
                )
                .try_init()
        };

        if initialized.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::debug!(
                environment = %environment,
                filter = %filter,
                json,
                "Console logging initialized"
            );
        }
    });
}

/// Current environment name
fn get_environment() -> String {
    std::env::var("WORKSHOP_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default level for an environment name
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn resolve_filter(rust_log: Option<&str>, verbosity: u8, environment: &str) -> String {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directives.to_string();
    }
    match verbosity {
        0 => get_log_level(environment).to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn use_json_format(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(
            resolve_filter(Some("message_workshop=trace"), 0, "production"),
            "message_workshop=trace"
        );
        assert_eq!(resolve_filter(Some("warn"), 2, "development"), "warn");
    }

    #[test]
    fn test_verbosity_overrides_environment() {
        assert_eq!(resolve_filter(None, 0, "production"), "info");
        assert_eq!(resolve_filter(None, 1, "production"), "debug");
        assert_eq!(resolve_filter(None, 3, "production"), "trace");
        assert_eq!(resolve_filter(Some("  "), 0, "production"), "info");
    }

    #[test]
    fn test_json_format_selection() {
        assert!(use_json_format(Some("JSON")));
        assert!(!use_json_format(Some("pretty")));
        assert!(!use_json_format(None));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging(0);
        init_structured_logging(2);
    }
}
