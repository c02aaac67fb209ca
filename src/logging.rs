//! Tracing subscriber setup

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Log file used when `--log` is combined with the dashboard
pub const DASHBOARD_LOG_FILE: &str = "proxy-checker.log";

/// Pick the filter directive: explicit flag, then `RUST_LOG`, then the default.
///
/// The dashboard owns the terminal, so without an explicit flag logging is off there.
pub fn filter_directive(explicit: Option<&str>, env: Option<&str>, tui: bool) -> String {
    match (explicit, env) {
        (Some(level), _) => level.to_string(),
        (None, _) if tui => "off".to_string(),
        (None, Some(env)) if !env.trim().is_empty() => env.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// The dashboard draws over stderr, so its logs go to a file
    File(PathBuf),
}

pub fn log_target(explicit: Option<&str>, tui: bool) -> LogTarget {
    if tui && explicit.is_some() {
        LogTarget::File(PathBuf::from(DASHBOARD_LOG_FILE))
    } else {
        LogTarget::Stderr
    }
}

/// Install the global subscriber. Logs go to stderr so the progress line on
/// stdout stays intact, or to a file while the dashboard is up.
pub fn init(explicit: Option<&str>, tui: bool) -> anyhow::Result<LogTarget> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(explicit, env.as_deref(), tui);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", directive, e))?;

    let target = log_target(explicit, tui);
    match &target {
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(false),
                )
                .try_init()?
        }
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_directive(Some("debug"), Some("info"), false), "debug");
        assert_eq!(filter_directive(None, Some("info"), false), "info");
        assert_eq!(filter_directive(None, None, false), "warn");
        assert_eq!(filter_directive(None, Some("  "), false), "warn");
    }

    #[test]
    fn test_tui_silences_logging_unless_asked() {
        assert_eq!(filter_directive(None, Some("debug"), true), "off");
        assert_eq!(filter_directive(Some("trace"), None, true), "trace");
    }

    #[test]
    fn test_dashboard_logs_go_to_file() {
        assert_eq!(
            log_target(Some("debug"), true),
            LogTarget::File(PathBuf::from(DASHBOARD_LOG_FILE))
        );
        assert_eq!(log_target(None, true), LogTarget::Stderr);
        assert_eq!(log_target(Some("debug"), false), LogTarget::Stderr);
    }
}
