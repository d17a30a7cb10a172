//! # sat-csf-scraper
//!
//! Extract structured taxpayer data from Mexican SAT tax-status certificates
//! (*Constancia de Situación Fiscal*).
//!
//! ## Why this crate?
//!
//! A certificate PDF carries some of its data in the text layer, and a QR
//! code pointing at the SAT validator page that carries the rest (current
//! status, address, régimen). Getting both means decoding the QR reliably,
//! reaching a government host with an unpredictable TLS setup, and parsing a
//! template that drifts between issuance dates. This crate does all three
//! and folds the outcome into one flat record per certificate, never
//! failing a batch because one document went wrong.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input    reject empty / implausibly small content
//!  ├─ 2. Scan     one pdfium pass: raster, links, text, images (spawn_blocking)
//!  ├─ 3. Locate   QR ─▶ link annotation ─▶ page text ─▶ embedded images
//!  ├─ 4. PDF      tiered regex extraction over the text layer → pdf_*
//!  ├─ 5. Fetch    cache ─miss─▶ 4 fetch strategies, first success wins
//!  ├─ 6. Web      visible text, mojibake repair, tiered extraction → web_*
//!  └─ 7. Record   status flags + fields, one per input
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sat_csf_scraper::{Processor, ScrapeCache, ScraperConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(ScrapeCache::new());
//!     let processor = Processor::new(ScraperConfig::default(), cache)?;
//!     let bytes = std::fs::read("constancia.pdf")?;
//!     let record = processor.process_pdf(&bytes, "constancia.pdf").await;
//!     println!("{}", serde_json::to_string_pretty(&record)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `csf-scrape` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sat-csf-scraper = { version = "0.1", default-features = false }
//! ```
//!
//! ## TLS
//!
//! The validator host has historically served incomplete chains and legacy
//! protocol versions, so the default [`TlsPolicy`] accepts invalid
//! certificates. The relaxation is scoped to this crate's own HTTP clients;
//! use [`TlsPolicy::strict`] to keep full verification.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod record;
pub mod report;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CachedScrape, ScrapeCache};
pub use config::{ScraperConfig, ScraperConfigBuilder, TlsFloor, TlsPolicy};
pub use error::{CsfError, DocumentError};
pub use pipeline::document::{PdfBackend, PdfScan, PdfiumBackend};
pub use pipeline::fetch::{FetchChain, FetchOutcome, FetchStrategy};
pub use pipeline::input::Document;
pub use process::Processor;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::ResultRecord;
pub use report::{build_report, Report, Sheet};
pub use stream::{process_stream, RecordStream};
