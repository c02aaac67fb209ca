//! Proxy checker module for probing a single proxy

use crate::error::ProbeError;
use crate::proxy::models::{ProbeResult, Proxy, ProxyEntry};
use crate::Result;
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Longest body prefix kept from a successful quick check
const SNIPPET_LEN: usize = 50;

const QUICK_TIMEOUT_SECS: u64 = 7;
const QUICK_CONCURRENCY: usize = 30;
const QUICK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const THOROUGH_TIMEOUT_SECS: u64 = 10;
const THOROUGH_CONCURRENCY: usize = 10;
const THOROUGH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// IP echo services; any one answering is enough
const QUICK_TARGETS: &[(&str, &str)] = &[
    ("http://httpbin.org/ip", "httpbin"),
    ("https://api.ipify.org?format=json", "ipify"),
    ("http://icanhazip.com", "icanhazip"),
    ("https://checkip.amazonaws.com", "checkip"),
];

/// Real sites over both schemes; all of them must load
const THOROUGH_TARGETS: &[(&str, &str)] = &[
    ("https://www.google.com", "Google"),
    ("https://www.wikipedia.org", "Wikipedia"),
    ("http://example.com", "Example.com"),
];

/// How a proxy is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Try IP echo services in order, pass on the first 200
    #[default]
    Quick,
    /// Load every real site, pass only if all answer 200
    Thorough,
}

impl ProbeMode {
    pub fn default_timeout(self) -> Duration {
        match self {
            ProbeMode::Quick => Duration::from_secs(QUICK_TIMEOUT_SECS),
            ProbeMode::Thorough => Duration::from_secs(THOROUGH_TIMEOUT_SECS),
        }
    }

    pub fn default_concurrency(self) -> usize {
        match self {
            ProbeMode::Quick => QUICK_CONCURRENCY,
            ProbeMode::Thorough => THOROUGH_CONCURRENCY,
        }
    }

    pub fn user_agent(self) -> &'static str {
        match self {
            ProbeMode::Quick => QUICK_USER_AGENT,
            ProbeMode::Thorough => THOROUGH_USER_AGENT,
        }
    }

    pub fn targets(self) -> Vec<Target> {
        let table = match self {
            ProbeMode::Quick => QUICK_TARGETS,
            ProbeMode::Thorough => THOROUGH_TARGETS,
        };
        table.iter().map(|(url, name)| Target::new(*url, *name)).collect()
    }

    pub fn default_input(self) -> &'static str {
        match self {
            ProbeMode::Quick => "proxies.txt",
            ProbeMode::Thorough => "working_proxies.txt",
        }
    }

    pub fn default_output(self) -> &'static str {
        match self {
            ProbeMode::Quick => "working_proxies.txt",
            ProbeMode::Thorough => "verified_working_proxies.txt",
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Quick => write!(f, "quick"),
            ProbeMode::Thorough => write!(f, "thorough"),
        }
    }
}

/// A URL requested through the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    /// Short name used in failure labels
    pub name: String,
}

impl Target {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub mode: ProbeMode,
    /// Timeout for each request through the proxy
    pub timeout: Duration,
    /// Number of probes in flight at once
    pub concurrency: usize,
    pub targets: Vec<Target>,
    pub user_agent: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::for_mode(ProbeMode::default())
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_mode(mode: ProbeMode) -> Self {
        Self {
            mode,
            timeout: mode.default_timeout(),
            concurrency: mode.default_concurrency(),
            targets: mode.targets(),
            user_agent: mode.user_agent().to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Probes one proxy at a time against the configured targets
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single proxy. Every failure is folded into the result.
    pub async fn check_proxy(&self, entry: &ProxyEntry) -> ProbeResult {
        let client = match self.create_client(&entry.proxy) {
            Ok(client) => client,
            Err(e) => {
                debug!(proxy = %entry.address, error = %e, "could not build client");
                return ProbeResult::failed(entry, ProbeError::Client(e.to_string()).to_string());
            }
        };

        match self.config.mode {
            ProbeMode::Quick => self.check_quick(&client, entry).await,
            ProbeMode::Thorough => self.check_thorough(&client, entry).await,
        }
    }

    /// First 200 wins; an unreachable proxy stops the walk early.
    async fn check_quick(&self, client: &Client, entry: &ProxyEntry) -> ProbeResult {
        let start = Instant::now();
        let mut attempted = 0;
        let mut errors = Vec::new();
        let mut last_error = None;
        let mut aborted = None;

        for target in &self.config.targets {
            attempted += 1;
            match self.fetch(client, target).await {
                Ok(body) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(proxy = %entry.address, url = %target.url, elapsed, "proxy working");
                    return ProbeResult::working(entry, elapsed)
                        .with_tally(1, attempted)
                        .with_errors(errors)
                        .with_snippet(snippet(&body));
                }
                Err(e) => {
                    debug!(proxy = %entry.address, url = %target.url, error = %e, "target failed");
                    errors.push(format!("{}: {}", target.name, e.label()));
                    if e.is_fatal() {
                        aborted = Some(e.clone());
                        last_error = Some(e);
                        break;
                    }
                    last_error = Some(e);
                }
            }
        }

        Self::failure(entry, last_error, errors)
            .with_tally(0, attempted)
            .with_aborted(aborted)
    }

    /// Every target is requested; the proxy passes only if all answer 200.
    async fn check_thorough(&self, client: &Client, entry: &ProxyEntry) -> ProbeResult {
        let start = Instant::now();
        let mut passed = 0;
        let mut errors = Vec::new();
        let mut last_error = None;

        for target in &self.config.targets {
            match self.fetch(client, target).await {
                Ok(_) => passed += 1,
                Err(e) => {
                    debug!(proxy = %entry.address, url = %target.url, error = %e, "target failed");
                    errors.push(format!("{}: {}", target.name, e.label()));
                    last_error = Some(e);
                }
            }
        }

        let attempted = self.config.targets.len();
        if last_error.is_none() && passed == attempted && attempted > 0 {
            let elapsed = start.elapsed().as_millis() as u64;
            return ProbeResult::working(entry, elapsed).with_tally(passed, attempted);
        }

        Self::failure(entry, last_error, errors).with_tally(passed, attempted)
    }

    fn failure(entry: &ProxyEntry, error: Option<ProbeError>, errors: Vec<String>) -> ProbeResult {
        let result = match error {
            Some(e) if e.is_timeout() => ProbeResult::timeout(entry),
            Some(e) => ProbeResult::failed(entry, e.to_string()),
            None => ProbeResult::failed(entry, "no targets configured".to_string()),
        };
        result.with_errors(errors)
    }

    /// GET one target through the proxy, returning the body of a 200
    async fn fetch(&self, client: &Client, target: &Target) -> std::result::Result<String, ProbeError> {
        let request = async {
            let response = client.get(&target.url).send().await?;
            let status = response.status();
            trace!(url = %target.url, %status, "response received");
            if status != StatusCode::OK {
                return Err(ProbeError::Status(status.as_u16()));
            }
            Ok::<_, ProbeError>(response.text().await?)
        };

        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    /// Build a client that sends both http and https traffic through the proxy
    fn create_client(&self, proxy: &Proxy) -> Result<Client> {
        // Credentials stay out of the URL so reserved characters survive
        let mut reqwest_proxy = ReqwestProxy::all(proxy.endpoint())?;
        if let Some(auth) = &proxy.auth {
            reqwest_proxy = reqwest_proxy.basic_auth(&auth.username, &auth.password);
        }

        let client = Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.timeout)
            .user_agent(self.config.user_agent.as_str())
            .build()?;

        Ok(client)
    }
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{ProbeStatus, ProxyType};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry_for(server: &MockServer) -> ProxyEntry {
        let addr = server.address();
        ProxyEntry::new(
            addr.to_string(),
            Proxy::new(addr.ip().to_string(), addr.port(), ProxyType::Http),
            0,
        )
    }

    fn dead_entry() -> ProxyEntry {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        ProxyEntry::new(
            addr.to_string(),
            Proxy::new(addr.ip().to_string(), addr.port(), ProxyType::Http),
            0,
        )
    }

    fn targets() -> Vec<Target> {
        vec![
            Target::new("http://alpha.test/ip", "Alpha"),
            Target::new("http://beta.test/ip", "Beta"),
            Target::new("http://gamma.test/", "Gamma"),
        ]
    }

    fn checker(mode: ProbeMode) -> ProxyChecker {
        ProxyChecker::with_config(
            CheckerConfig::for_mode(mode)
                .with_targets(targets())
                .with_timeout(Duration::from_secs(2)),
        )
    }

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.mode, ProbeMode::Quick);
        assert_eq!(config.timeout, Duration::from_secs(QUICK_TIMEOUT_SECS));
        assert_eq!(config.concurrency, QUICK_CONCURRENCY);
        assert_eq!(config.targets.len(), 4);
        assert_eq!(config.targets[0].url, "http://httpbin.org/ip");
    }

    #[test]
    fn test_thorough_defaults() {
        let config = CheckerConfig::for_mode(ProbeMode::Thorough);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.concurrency, 10);
        let names: Vec<_> = config.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Google", "Wikipedia", "Example.com"]);
        assert!(config.user_agent.contains("Chrome/120"));
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_concurrency(0)
            .with_user_agent("probe/1.0");

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.user_agent, "probe/1.0");
    }

    #[test]
    fn test_snippet_trims_and_truncates() {
        assert_eq!(snippet("  203.0.113.9\n"), "203.0.113.9");
        assert_eq!(snippet(&"x".repeat(80)).len(), SNIPPET_LEN);
    }

    #[tokio::test]
    async fn test_quick_passes_on_first_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("host", "alpha.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"origin\": \"203.0.113.9\"}\n"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(header("host", "beta.test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = checker(ProbeMode::Quick).check_proxy(&entry_for(&server)).await;
        assert!(result.is_working());
        assert_eq!(result.attempted, 1);
        assert_eq!(result.snippet.as_deref(), Some("{\"origin\": \"203.0.113.9\"}"));
        assert!(result.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_quick_falls_through_bad_status() {
        let server = MockServer::start().await;
        Mock::given(header("host", "alpha.test"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(header("host", "beta.test"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(header("host", "gamma.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.4"))
            .mount(&server)
            .await;

        let result = checker(ProbeMode::Quick).check_proxy(&entry_for(&server)).await;
        assert!(result.is_working());
        assert_eq!(result.attempted, 3);
        assert_eq!(result.errors, vec!["Alpha: Status 503", "Beta: Status 403"]);
    }

    #[tokio::test]
    async fn test_quick_fails_when_no_target_answers_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(407))
            .mount(&server)
            .await;

        let result = checker(ProbeMode::Quick).check_proxy(&entry_for(&server)).await;
        assert!(!result.is_working());
        assert_eq!(result.attempted, 3);
        assert_eq!(result.status, ProbeStatus::Failed("HTTP status: 407".to_string()));
    }

    #[tokio::test]
    async fn test_quick_stops_on_unreachable_proxy() {
        let result = checker(ProbeMode::Quick).check_proxy(&dead_entry()).await;
        assert!(!result.is_working());
        assert_eq!(result.attempted, 1);
        assert_eq!(result.errors, vec!["Alpha: Connection Failed"]);
        assert!(matches!(result.aborted, Some(ProbeError::Connection(_))));
    }

    #[tokio::test]
    async fn test_quick_stops_on_failed_tunnel_after_first_target() {
        // No mock answers the CONNECT for beta.test, so the tunnel is refused
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("host", "alpha.test"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("host", "gamma.test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let checker = ProxyChecker::with_config(
            CheckerConfig::for_mode(ProbeMode::Quick)
                .with_targets(vec![
                    Target::new("http://alpha.test/ip", "Alpha"),
                    Target::new("https://beta.test/ip", "Beta"),
                    Target::new("http://gamma.test/", "Gamma"),
                ])
                .with_timeout(Duration::from_secs(2)),
        );
        let result = checker.check_proxy(&entry_for(&server)).await;

        assert!(!result.is_working());
        assert_eq!(result.attempted, 2);
        assert_eq!(result.errors, vec!["Alpha: Status 503", "Beta: Connection Failed"]);
        assert!(matches!(result.aborted, Some(ProbeError::Connection(_))));
    }

    #[tokio::test]
    async fn test_quick_read_timeouts_do_not_abort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let checker = ProxyChecker::with_config(
            CheckerConfig::for_mode(ProbeMode::Quick)
                .with_targets(vec![
                    Target::new("http://alpha.test/ip", "Alpha"),
                    Target::new("http://beta.test/ip", "Beta"),
                ])
                .with_timeout(Duration::from_millis(200)),
        );
        let result = checker.check_proxy(&entry_for(&server)).await;
        assert!(result.is_timeout());
        assert_eq!(result.attempted, 2);
        assert!(result.aborted.is_none());
    }

    #[tokio::test]
    async fn test_credentials_with_reserved_characters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("proxy-authorization", "Basic dXNlcjpwI3Nz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.20"))
            .expect(1)
            .mount(&server)
            .await;

        let address = format!("{}:user:p#ss", server.address());
        let proxy = crate::proxy::ProxyParser::parse_line(&address, ProxyType::Http).unwrap();
        assert_eq!(proxy.auth.as_ref().unwrap().password, "p#ss");

        let result = checker(ProbeMode::Quick)
            .check_proxy(&ProxyEntry::new(address, proxy, 0))
            .await;
        assert!(result.is_working(), "status: {:?}", result.status);
        assert_eq!(result.snippet.as_deref(), Some("203.0.113.20"));
    }

    #[tokio::test]
    async fn test_slow_proxy_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let checker = ProxyChecker::with_config(
            CheckerConfig::for_mode(ProbeMode::Quick)
                .with_targets(vec![Target::new("http://alpha.test/ip", "Alpha")])
                .with_timeout(Duration::from_millis(200)),
        );
        let result = checker.check_proxy(&entry_for(&server)).await;
        assert!(result.is_timeout());
        assert_eq!(result.errors, vec!["Alpha: Timeout"]);
    }

    #[tokio::test]
    async fn test_thorough_requires_every_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(3)
            .mount(&server)
            .await;

        let result = checker(ProbeMode::Thorough).check_proxy(&entry_for(&server)).await;
        assert!(result.is_working());
        assert_eq!((result.passed, result.attempted), (3, 3));
        assert!(result.errors.is_empty());
        assert!(result.snippet.is_none());
    }

    #[tokio::test]
    async fn test_thorough_fails_on_single_bad_site() {
        let server = MockServer::start().await;
        Mock::given(header("host", "beta.test"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = checker(ProbeMode::Thorough).check_proxy(&entry_for(&server)).await;
        assert!(!result.is_working());
        assert_eq!((result.passed, result.attempted), (2, 3));
        assert_eq!(result.errors, vec!["Beta: Status 403"]);
    }

    #[tokio::test]
    async fn test_thorough_tries_all_sites_on_dead_proxy() {
        let result = checker(ProbeMode::Thorough).check_proxy(&dead_entry()).await;
        assert!(!result.is_working());
        assert_eq!((result.passed, result.attempted), (0, 3));
        assert_eq!(result.errors.len(), 3);
    }
}
