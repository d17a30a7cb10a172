//! Configuration types for certificate scraping.
//!
//! All pipeline behaviour is controlled through [`ScraperConfig`], built via
//! its [`ScraperConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across concurrent documents and to log exactly
//! which thresholds and TLS posture a run used.
//!
//! # Design choice: explicit TLS policy
//! The validator host is known for legacy certificate setups, so the fetch
//! chain has to relax verification. That relaxation lives in [`TlsPolicy`],
//! a value handed to each fetch strategy, instead of a process-wide switch
//! that silently weakens every other HTTP client in the program.

use crate::error::CsfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Validator page that CSF QR codes point at. Bare `D1=..&D2=..&D3=..`
/// query fragments found in page text are rebuilt against this base.
pub const DEFAULT_VALIDATOR_URL: &str =
    "https://siat.sat.gob.mx/app/qr/faces/pages/mobile/validadorqr.jsf";

/// Configuration for a scraping session.
///
/// Built via [`ScraperConfig::builder()`] or using
/// [`ScraperConfig::default()`].
///
/// # Example
/// ```rust
/// use sat_csf_scraper::ScraperConfig;
///
/// let config = ScraperConfig::builder()
///     .request_timeout_secs(10)
///     .concurrency(2)
///     .web_scraping(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScraperConfig {
    /// Per-strategy request timeout in seconds. Default: 15.
    ///
    /// The command-line strategy gets a hard bound of twice this value,
    /// after which the child process is killed.
    pub request_timeout_secs: u64,

    /// Upscaling factor used when rasterising the first page for QR
    /// decoding. Range: 1.0–6.0. Default: 3.0.
    ///
    /// The QR module on a CSF is small; at native resolution the decoder
    /// frequently misses it.
    pub render_scale: f32,

    /// Inputs shorter than this many bytes are rejected as degenerate
    /// before pdfium sees them. Default: 100.
    pub min_pdf_bytes: usize,

    /// Primary-tier yield below which PDF alternate patterns run. Default: 8.
    pub pdf_field_threshold: usize,

    /// Primary-tier yield below which web alternate patterns run. Default: 10.
    pub web_field_threshold: usize,

    /// Number of leading pages whose text feeds PDF field extraction.
    /// `None` reads every page. Default: `None`.
    pub max_text_pages: Option<usize>,

    /// Substring a link annotation or text URL must contain to be accepted.
    /// Default: `sat.gob.mx`.
    pub expected_domain: String,

    /// Base URL used to rebuild bare validator query fragments.
    pub validator_base_url: String,

    /// TLS posture handed to every fetch strategy. Default: [`TlsPolicy::relaxed`].
    pub tls: TlsPolicy,

    /// Executable used by the command-line fetch strategy. Default: `curl`.
    pub curl_binary: String,

    /// Number of documents processed concurrently by the batch helpers.
    /// Default: 2.
    ///
    /// The validator throttles aggressive clients; two in-flight documents
    /// is the most it tolerates reliably.
    pub concurrency: usize,

    /// Fetch and parse the validator page when a URL is found. Default: true.
    pub web_scraping: bool,

    /// Extract fields from the PDF text layer. Default: true.
    pub pdf_extraction: bool,

    /// Directory containing libpdfium. `None` tries `./` then the system
    /// library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional progress callback for batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            render_scale: 3.0,
            min_pdf_bytes: 100,
            pdf_field_threshold: 8,
            web_field_threshold: 10,
            max_text_pages: None,
            expected_domain: "sat.gob.mx".to_string(),
            validator_base_url: DEFAULT_VALIDATOR_URL.to_string(),
            tls: TlsPolicy::relaxed(),
            curl_binary: "curl".to_string(),
            concurrency: 2,
            web_scraping: true,
            pdf_extraction: true,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScraperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperConfig")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("render_scale", &self.render_scale)
            .field("min_pdf_bytes", &self.min_pdf_bytes)
            .field("pdf_field_threshold", &self.pdf_field_threshold)
            .field("web_field_threshold", &self.web_field_threshold)
            .field("max_text_pages", &self.max_text_pages)
            .field("expected_domain", &self.expected_domain)
            .field("validator_base_url", &self.validator_base_url)
            .field("tls", &self.tls)
            .field("curl_binary", &self.curl_binary)
            .field("concurrency", &self.concurrency)
            .field("web_scraping", &self.web_scraping)
            .field("pdf_extraction", &self.pdf_extraction)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ScraperConfig {
    /// Create a new builder for `ScraperConfig`.
    pub fn builder() -> ScraperConfigBuilder {
        ScraperConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-strategy timeout as a `Duration`.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`ScraperConfig`].
#[derive(Debug)]
pub struct ScraperConfigBuilder {
    config: ScraperConfig,
}

impl ScraperConfigBuilder {
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 6.0);
        self
    }

    pub fn min_pdf_bytes(mut self, n: usize) -> Self {
        self.config.min_pdf_bytes = n;
        self
    }

    pub fn pdf_field_threshold(mut self, n: usize) -> Self {
        self.config.pdf_field_threshold = n;
        self
    }

    pub fn web_field_threshold(mut self, n: usize) -> Self {
        self.config.web_field_threshold = n;
        self
    }

    pub fn max_text_pages(mut self, pages: Option<usize>) -> Self {
        self.config.max_text_pages = pages;
        self
    }

    pub fn expected_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.expected_domain = domain.into();
        self
    }

    pub fn validator_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.validator_base_url = url.into();
        self
    }

    pub fn tls(mut self, policy: TlsPolicy) -> Self {
        self.config.tls = policy;
        self
    }

    pub fn curl_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.curl_binary = bin.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn web_scraping(mut self, v: bool) -> Self {
        self.config.web_scraping = v;
        self
    }

    pub fn pdf_extraction(mut self, v: bool) -> Self {
        self.config.pdf_extraction = v;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Set a progress callback to receive per-document events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScraperConfig, CsfError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(CsfError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.expected_domain.trim().is_empty() {
            return Err(CsfError::InvalidConfig(
                "expected_domain must not be empty".into(),
            ));
        }
        if !c.validator_base_url.starts_with("http://")
            && !c.validator_base_url.starts_with("https://")
        {
            return Err(CsfError::InvalidConfig(format!(
                "validator_base_url must be an HTTP(S) URL, got '{}'",
                c.validator_base_url
            )));
        }
        if c.curl_binary.trim().is_empty() {
            return Err(CsfError::InvalidConfig("curl_binary must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── TLS policy ───────────────────────────────────────────────────────────

/// Lowest TLS protocol version a strategy will negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsFloor {
    Tls10,
    Tls11,
    #[default]
    Tls12,
}

impl TlsFloor {
    pub(crate) fn as_reqwest(self) -> reqwest::tls::Version {
        match self {
            TlsFloor::Tls10 => reqwest::tls::Version::TLS_1_0,
            TlsFloor::Tls11 => reqwest::tls::Version::TLS_1_1,
            TlsFloor::Tls12 => reqwest::tls::Version::TLS_1_2,
        }
    }
}

/// Certificate and protocol checks applied by the fetch strategies.
///
/// Each strategy reads the policy and maps it onto its own client: reqwest
/// builder flags, or `-k` for the command-line client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsPolicy {
    /// Accept expired, self-signed or otherwise invalid certificates.
    pub accept_invalid_certs: bool,
    /// Accept certificates whose names do not match the host.
    pub accept_invalid_hostnames: bool,
    /// Lowest protocol version offered.
    pub min_tls: TlsFloor,
}

impl TlsPolicy {
    /// Full verification, TLS 1.2 or newer.
    pub fn strict() -> Self {
        Self {
            accept_invalid_certs: false,
            accept_invalid_hostnames: false,
            min_tls: TlsFloor::Tls12,
        }
    }

    /// Invalid certificates tolerated, legacy protocol versions offered.
    /// Hostnames are still checked where the client supports it.
    pub fn relaxed() -> Self {
        Self {
            accept_invalid_certs: true,
            accept_invalid_hostnames: false,
            min_tls: TlsFloor::Tls10,
        }
    }

    /// No certificate or hostname verification at all.
    pub fn insecure() -> Self {
        Self {
            accept_invalid_certs: true,
            accept_invalid_hostnames: true,
            min_tls: TlsFloor::Tls10,
        }
    }

    /// The policy a strategy that wants the most permissive posture should
    /// use. A strict session stays strict.
    pub fn widened(self) -> Self {
        if self.accept_invalid_certs {
            Self::insecure()
        } else {
            self
        }
    }
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self::relaxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ScraperConfig::default();
        assert_eq!(c.request_timeout_secs, 15);
        assert_eq!(c.min_pdf_bytes, 100);
        assert_eq!(c.pdf_field_threshold, 8);
        assert_eq!(c.web_field_threshold, 10);
        assert_eq!(c.concurrency, 2);
        assert_eq!(c.tls, TlsPolicy::relaxed());
        assert!(c.max_text_pages.is_none());
    }

    #[test]
    fn builder_clamps_values() {
        let c = ScraperConfig::builder()
            .render_scale(20.0)
            .concurrency(0)
            .request_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.render_scale, 6.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.request_timeout_secs, 1);
    }

    #[test]
    fn builder_rejects_non_http_validator() {
        let err = ScraperConfig::builder()
            .validator_base_url("ftp://example.org")
            .build()
            .unwrap_err();
        assert!(matches!(err, CsfError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_domain() {
        assert!(ScraperConfig::builder().expected_domain("  ").build().is_err());
    }

    #[test]
    fn strict_policy_is_not_widened() {
        assert_eq!(TlsPolicy::strict().widened(), TlsPolicy::strict());
        assert_eq!(TlsPolicy::relaxed().widened(), TlsPolicy::insecure());
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ScraperConfig::default());
        assert!(dbg.contains("ScraperConfig"));
        assert!(dbg.contains("sat.gob.mx"));
    }
}
