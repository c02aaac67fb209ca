//! Proxy Checker - bulk proxy list validation
//!
//! Routes HTTP/HTTPS requests through every proxy in a list and keeps the
//! ones that answer. Two fixed probe modes are available: a quick pass that
//! accepts the first successful target, and a thorough pass that requires
//! every real-world site to load.

pub mod error;
pub mod logging;
pub mod proxy;
pub mod report;
pub mod tui;

pub use error::ProbeError;
pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Run-level configuration: where proxies come from and where results go
#[derive(Debug, Clone)]
pub struct Config {
    /// Probe mode for this run
    pub mode: ProbeMode,
    /// Newline-delimited proxy list
    pub input: PathBuf,
    /// File receiving working proxies
    pub output: PathBuf,
    /// Optional file receiving failed proxies
    pub bad_output: Option<PathBuf>,
    /// Optional JSON report of every result
    pub json_report: Option<PathBuf>,
    /// Show the terminal dashboard instead of line output
    pub tui: bool,
    /// Wait for Enter before exiting
    pub pause_on_exit: bool,
}

impl Config {
    /// Default file names for a probe mode
    pub fn for_mode(mode: ProbeMode) -> Self {
        Self {
            mode,
            input: PathBuf::from(mode.default_input()),
            output: PathBuf::from(mode.default_output()),
            bad_output: None,
            json_report: None,
            tui: false,
            pause_on_exit: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_mode(ProbeMode::default())
    }
}
