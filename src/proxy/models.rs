//! Proxy data models

use crate::error::ProbeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Proxy authentication credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl ProxyAuth {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

/// Proxy model representing a single proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl Proxy {
    /// Create a new proxy without authentication
    pub fn new(host: String, port: u16, proxy_type: ProxyType) -> Self {
        Self {
            host,
            port,
            proxy_type,
            auth: None,
        }
    }

    /// Create a new proxy with authentication
    pub fn with_auth(
        host: String,
        port: u16,
        proxy_type: ProxyType,
        username: String,
        password: String,
    ) -> Self {
        Self {
            host,
            port,
            proxy_type,
            auth: Some(ProxyAuth::new(username, password)),
        }
    }

    /// Scheme, host and port without credentials
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.proxy_type, self.host, self.port)
    }

    /// Get the proxy URL string for display; credentials are not escaped
    pub fn url(&self) -> String {
        let auth_part = self.auth.as_ref().map_or(String::new(), |auth| {
            format!("{}:{}@", auth.username, auth.password)
        });

        format!("{}://{}{}:{}", self.proxy_type, auth_part, self.host, self.port)
    }

    /// Get the proxy string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// One line of the input list together with its parsed proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    /// The trimmed line exactly as the user wrote it
    pub address: String,
    pub proxy: Proxy,
    /// Position in the input list, used to keep output files in input order
    pub index: usize,
}

impl ProxyEntry {
    pub fn new(address: impl Into<String>, proxy: Proxy, index: usize) -> Self {
        Self {
            address: address.into(),
            proxy,
            index,
        }
    }
}

/// Outcome of probing one proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ProbeStatus {
    Working,
    Failed(String),
    Timeout,
}

/// Detailed result of probing one proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub address: String,
    #[serde(skip)]
    pub index: usize,
    pub proxy: Proxy,
    pub status: ProbeStatus,
    pub response_time_ms: Option<u64>,
    /// Targets that answered 200
    pub passed: usize,
    /// Targets actually requested
    pub attempted: usize,
    /// Per-target failure labels, e.g. `Google: Status 403`
    pub errors: Vec<String>,
    /// Start of the body returned by the first successful target
    pub snippet: Option<String>,
    /// Connect-level error that stopped the quick walk before the last target
    #[serde(skip)]
    pub aborted: Option<ProbeError>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    fn base(entry: &ProxyEntry, status: ProbeStatus) -> Self {
        Self {
            address: entry.address.clone(),
            index: entry.index,
            proxy: entry.proxy.clone(),
            status,
            response_time_ms: None,
            passed: 0,
            attempted: 0,
            errors: Vec::new(),
            snippet: None,
            aborted: None,
            checked_at: Utc::now(),
        }
    }

    pub fn working(entry: &ProxyEntry, response_time_ms: u64) -> Self {
        Self {
            response_time_ms: Some(response_time_ms),
            ..Self::base(entry, ProbeStatus::Working)
        }
    }

    pub fn failed(entry: &ProxyEntry, error: String) -> Self {
        Self::base(entry, ProbeStatus::Failed(error))
    }

    pub fn timeout(entry: &ProxyEntry) -> Self {
        Self::base(entry, ProbeStatus::Timeout)
    }

    /// Record how many targets were tried and how many passed
    pub fn with_tally(mut self, passed: usize, attempted: usize) -> Self {
        self.passed = passed;
        self.attempted = attempted;
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.snippet = Some(snippet);
        self
    }

    pub fn with_aborted(mut self, aborted: Option<ProbeError>) -> Self {
        self.aborted = aborted;
        self
    }

    pub fn is_working(&self) -> bool {
        matches!(self.status, ProbeStatus::Working)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.status, ProbeStatus::Timeout)
    }
}

/// Running totals reported after every completed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub checked: usize,
    pub working: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count one finished probe
    pub fn record(&mut self, result: &ProbeResult) {
        self.checked += 1;
        if result.is_working() {
            self.working += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.checked - self.working
    }

    pub fn percent(&self) -> u16 {
        if self.total == 0 {
            0
        } else {
            (self.checked as f64 / self.total as f64 * 100.0) as u16
        }
    }

    pub fn is_complete(&self) -> bool {
        self.checked >= self.total
    }
}
