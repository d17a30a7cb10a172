//! Fetching the validator page through an ordered chain of strategies.
//!
//! ## Why several strategies?
//!
//! The validator host runs a TLS stack that no single client configuration
//! reaches reliably: depending on the day it presents an incomplete chain,
//! an outdated protocol version or a certificate whose name does not match.
//! Each strategy below differs in client, TLS backend and posture. They are
//! ordered from the most standard (fast when it works) to the most
//! permissive, tried exactly once each, and the first HTTP 200 with a
//! non-empty body wins. There is no retry or backoff.
//!
//! | # | Strategy | Client | TLS |
//! |---|----------|--------|-----|
//! | 1 | [`BrowserSession`]   | reqwest, browser headers | native-tls, session policy |
//! | 2 | [`CurlCommand`]      | external `curl` | `-k` when certs are relaxed |
//! | 3 | [`InsecureTransport`]| reqwest, HTTP/1.1 | rustls, no verification |
//! | 4 | [`LegacyBrowser`]    | reqwest, MSIE UA | native-tls, session policy |
//!
//! Every strategy swallows its own errors, logs them at `debug`, and reports
//! plain `None`.

use crate::config::{ScraperConfig, TlsPolicy};
use crate::error::CsfError;
use crate::pipeline::chain::{first_success_async, Labelled};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Desktop Chrome UA sent by the browser-like strategies.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Truncated UA the command-line and insecure strategies send.
pub const SHORT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// UA of the final, legacy attempt.
pub const LEGACY_USER_AGENT: &str = "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1; Trident/6.0)";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_HTML_WEBP: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// One way of retrieving a page.
pub trait FetchStrategy: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the strategy can run on this host. Defaults to `true`.
    fn available(&self) -> BoxFuture<'_, bool> {
        async { true }.boxed()
    }

    /// Body of `url`, or `None` on any failure.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Option<String>>;
}

impl Labelled for Arc<dyn FetchStrategy> {
    fn label(&self) -> &str {
        self.name()
    }
}

/// A successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub body: String,
    /// Name of the strategy that produced the body.
    pub strategy: &'static str,
}

/// Ordered strategies, short-circuiting on the first success.
#[derive(Clone)]
pub struct FetchChain {
    strategies: Vec<Arc<dyn FetchStrategy>>,
}

impl std::fmt::Debug for FetchChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl FetchChain {
    /// A chain over arbitrary strategies, tried in the given order.
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The four built-in strategies configured from `config`.
    pub fn standard(config: &ScraperConfig) -> Result<Self, CsfError> {
        let timeout = config.request_timeout();
        let tls = config.tls;
        Ok(Self::new(vec![
            Arc::new(BrowserSession::new(tls, timeout)?),
            Arc::new(CurlCommand::new(&config.curl_binary, tls, timeout)),
            Arc::new(InsecureTransport::new(tls, timeout)?),
            Arc::new(LegacyBrowser::new(tls, timeout)?),
        ]))
    }

    /// Strategy names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try every strategy in order until one returns a body.
    pub async fn fetch(&self, url: &str) -> Option<FetchOutcome> {
        let (_, outcome) = first_success_async("fetch-chain", &self.strategies, |s| async move {
            if !s.available().await {
                debug!("Strategy '{}' unavailable on this host, skipping", s.name());
                return None;
            }
            s.fetch(url).await.map(|body| FetchOutcome {
                body,
                strategy: s.name(),
            })
        })
        .await?;

        info!(
            "Fetched {} bytes via '{}'",
            outcome.body.len(),
            outcome.strategy
        );
        Some(outcome)
    }
}

// ── reqwest-based strategies ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum TlsBackend {
    Native,
    Rustls,
}

fn build_client(
    strategy: &'static str,
    backend: TlsBackend,
    tls: TlsPolicy,
    timeout: Duration,
    headers: HeaderMap,
    user_agent: &str,
    http1_only: bool,
) -> Result<reqwest::Client, CsfError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(user_agent)
        .default_headers(headers)
        .gzip(true)
        .deflate(true)
        .danger_accept_invalid_certs(tls.accept_invalid_certs);

    builder = match backend {
        TlsBackend::Native => builder
            .use_native_tls()
            .danger_accept_invalid_hostnames(tls.accept_invalid_hostnames)
            .min_tls_version(tls.min_tls.as_reqwest()),
        // rustls speaks TLS 1.2+ only; with invalid certs accepted it skips
        // hostname verification as well.
        TlsBackend::Rustls => builder.use_rustls_tls(),
    };
    if http1_only {
        builder = builder.http1_only();
    }

    builder.build().map_err(|e| CsfError::HttpClientBuild {
        strategy,
        reason: e.to_string(),
    })
}

/// GET `url`; body only for HTTP 200 with non-blank content.
async fn get_body(strategy: &str, client: &reqwest::Client, url: &str) -> Option<String> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!("{}: request failed: {}", strategy, e);
            return None;
        }
    };
    if response.status() != StatusCode::OK {
        debug!("{}: HTTP {}", strategy, response.status());
        return None;
    }
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => Some(body),
        Ok(_) => {
            debug!("{}: empty body", strategy);
            None
        }
        Err(e) => {
            debug!("{}: failed reading body: {}", strategy, e);
            None
        }
    }
}

fn header_map(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
    pairs
        .iter()
        .map(|(name, value)| (name.clone(), HeaderValue::from_static(value)))
        .collect()
}

/// Strategy 1: a browser-like session over native-tls with the session's
/// TLS policy (legacy protocol floor, relaxed certificates by default).
#[derive(Debug, Clone)]
pub struct BrowserSession {
    client: reqwest::Client,
}

impl BrowserSession {
    pub const NAME: &'static str = "browser-session";

    pub fn new(tls: TlsPolicy, timeout: Duration) -> Result<Self, CsfError> {
        let headers = header_map(&[
            (header::ACCEPT, ACCEPT_HTML_WEBP),
            (header::ACCEPT_LANGUAGE, "es-MX,es;q=0.9,en;q=0.8"),
            (header::ACCEPT_ENCODING, "gzip, deflate"),
            (header::CONNECTION, "keep-alive"),
            (header::UPGRADE_INSECURE_REQUESTS, "1"),
            (header::HeaderName::from_static("sec-fetch-dest"), "document"),
            (header::HeaderName::from_static("sec-fetch-mode"), "navigate"),
            (header::HeaderName::from_static("sec-fetch-site"), "none"),
            (header::CACHE_CONTROL, "max-age=0"),
        ]);
        Ok(Self {
            client: build_client(
                Self::NAME,
                TlsBackend::Native,
                tls,
                timeout,
                headers,
                CHROME_USER_AGENT,
                false,
            )?,
        })
    }
}

impl FetchStrategy for BrowserSession {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Option<String>> {
        get_body(Self::NAME, &self.client, url).boxed()
    }
}

/// Strategy 3: rustls with certificate and hostname verification off,
/// HTTP/1.1 only. A strict session keeps verification on.
#[derive(Debug, Clone)]
pub struct InsecureTransport {
    client: reqwest::Client,
}

impl InsecureTransport {
    pub const NAME: &'static str = "insecure-transport";

    pub fn new(tls: TlsPolicy, timeout: Duration) -> Result<Self, CsfError> {
        let headers = header_map(&[(header::ACCEPT, ACCEPT_HTML)]);
        Ok(Self {
            client: build_client(
                Self::NAME,
                TlsBackend::Rustls,
                tls.widened(),
                timeout,
                headers,
                SHORT_USER_AGENT,
                true,
            )?,
        })
    }
}

impl FetchStrategy for InsecureTransport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Option<String>> {
        get_body(Self::NAME, &self.client, url).boxed()
    }
}

/// Strategy 4: native-tls again, with a legacy Internet Explorer UA and
/// minimal headers.
#[derive(Debug, Clone)]
pub struct LegacyBrowser {
    client: reqwest::Client,
}

impl LegacyBrowser {
    pub const NAME: &'static str = "legacy-browser";

    pub fn new(tls: TlsPolicy, timeout: Duration) -> Result<Self, CsfError> {
        let headers = header_map(&[
            (header::ACCEPT, ACCEPT_HTML),
            (header::ACCEPT_LANGUAGE, "es-mx"),
            (header::CONNECTION, "keep-alive"),
        ]);
        Ok(Self {
            client: build_client(
                Self::NAME,
                TlsBackend::Native,
                tls,
                timeout,
                headers,
                LEGACY_USER_AGENT,
                false,
            )?,
        })
    }
}

impl FetchStrategy for LegacyBrowser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Option<String>> {
        get_body(Self::NAME, &self.client, url).boxed()
    }
}

// ── Strategy 2: external command-line client ─────────────────────────────

/// Marker separating the body from the status code in curl's output.
const STATUS_MARKER: &str = "\n__csf_http_status__:";

/// Strategy 2: the `curl` executable, when present.
///
/// Presence is probed once with `curl --version` and memoised; a missing
/// binary only makes this strategy unavailable. The child gets curl's own
/// `--max-time` of twice the timeout and is killed if it outlives that.
#[derive(Debug)]
pub struct CurlCommand {
    binary: String,
    insecure: bool,
    timeout: Duration,
    present: OnceCell<bool>,
}

impl CurlCommand {
    pub const NAME: &'static str = "curl";

    pub fn new(binary: impl Into<String>, tls: TlsPolicy, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            insecure: tls.accept_invalid_certs,
            timeout,
            present: OnceCell::new(),
        }
    }

    /// Hard bound on one invocation.
    pub fn hard_timeout(&self) -> Duration {
        self.timeout * 2
    }

    /// Command-line arguments for fetching `url`.
    pub fn args(&self, url: &str) -> Vec<String> {
        let secs = self.timeout.as_secs().max(1);
        let mut args: Vec<String> = vec!["--silent".into()];
        if self.insecure {
            args.push("-k".into());
        }
        args.extend(
            [
                "--user-agent",
                SHORT_USER_AGENT,
                "--connect-timeout",
                &secs.to_string(),
                "--max-time",
                &(secs * 2).to_string(),
                "--location",
                "--compressed",
                "--header",
                "Accept-Charset: UTF-8",
                "--header",
                "Accept-Encoding: gzip, deflate",
                "--write-out",
                &format!("{STATUS_MARKER}%{{http_code}}"),
                url,
            ]
            .map(str::to_string),
        );
        args
    }

    async fn probe(&self) -> bool {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(Duration::from_secs(5), status).await {
            Ok(Ok(s)) if s.success() => true,
            Ok(Ok(s)) => {
                warn!("'{} --version' exited with {}", self.binary, s);
                false
            }
            Ok(Err(e)) => {
                debug!("'{}' not runnable: {}", self.binary, e);
                false
            }
            Err(_) => {
                warn!("'{} --version' timed out", self.binary);
                false
            }
        }
    }

    async fn run(&self, url: &str) -> Option<String> {
        let output = Command::new(&self.binary)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.hard_timeout(), output).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => {
                debug!("{}: spawn failed: {}", Self::NAME, e);
                return None;
            }
            Err(_) => {
                debug!("{}: killed after {:?}", Self::NAME, self.hard_timeout());
                return None;
            }
        };
        if !output.status.success() {
            debug!("{}: exited with {}", Self::NAME, output.status);
            return None;
        }
        parse_curl_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Split curl's stdout into body and status; body only for HTTP 200 with
/// non-blank content.
fn parse_curl_output(stdout: &str) -> Option<String> {
    let (body, status) = stdout.rsplit_once(STATUS_MARKER)?;
    if status.trim() != "200" {
        debug!("{}: HTTP {}", CurlCommand::NAME, status.trim());
        return None;
    }
    (!body.trim().is_empty()).then(|| body.to_string())
}

impl FetchStrategy for CurlCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn available(&self) -> BoxFuture<'_, bool> {
        async move { *self.present.get_or_init(|| self.probe()).await }.boxed()
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Option<String>> {
        self.run(url).boxed()
    }
}
