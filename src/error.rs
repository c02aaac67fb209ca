//! Probe error classification

use thiserror::Error;

/// Why a single request through a proxy did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The proxy did not accept a connection in time
    #[error("connect timeout")]
    ConnectTimeout,
    /// The proxy refused or dropped the connection
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request went out but no answer arrived in time
    #[error("timed out")]
    Timeout,
    /// The target answered with something other than 200
    #[error("HTTP status: {0}")]
    Status(u16),
    /// Any other request-level failure (body, redirect, decoding)
    #[error("request error: {0}")]
    Request(String),
    /// The HTTP client could not be built for this proxy
    #[error("invalid proxy: {0}")]
    Client(String),
}

impl ProbeError {
    /// Connect-level failures mean the proxy itself is unusable, so the
    /// quick check stops trying further targets.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::ConnectTimeout | ProbeError::Connection(_) | ProbeError::Client(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::ConnectTimeout | ProbeError::Timeout)
    }

    /// Short label used in per-site failure lists
    pub fn label(&self) -> String {
        match self {
            ProbeError::ConnectTimeout | ProbeError::Timeout => "Timeout".to_string(),
            ProbeError::Connection(_) => "Connection Failed".to_string(),
            ProbeError::Status(code) => format!("Status {}", code),
            ProbeError::Request(_) => "Request Error".to_string(),
            ProbeError::Client(_) => "Proxy Error".to_string(),
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            if e.is_timeout() {
                ProbeError::ConnectTimeout
            } else {
                ProbeError::Connection(e.to_string())
            }
        } else if e.is_timeout() {
            ProbeError::Timeout
        } else if let Some(status) = e.status() {
            ProbeError::Status(status.as_u16())
        } else if e.is_builder() {
            ProbeError::Client(e.to_string())
        } else {
            ProbeError::Request(e.to_string())
        }
    }
}
