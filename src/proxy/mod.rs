//! Proxy module for parsing and probing proxies
//!
//! This module provides functionality for:
//! - Parsing proxy lists in the common text formats
//! - Probing a single proxy against fixed target sites
//! - Running probes across a bounded worker pool with progress reporting

pub mod checker;
pub mod models;
pub mod parser;
pub mod pool;

pub use checker::{CheckerConfig, ProbeMode, ProxyChecker, Target};
pub use models::{ProbeResult, ProbeStatus, Progress, Proxy, ProxyAuth, ProxyEntry, ProxyType};
pub use parser::{ParsedList, ProxyParser};
pub use pool::PoolRunner;
