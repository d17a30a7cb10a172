//! The per-document orchestrator.
//!
//! ## Contract
//!
//! [`Processor::process_pdf`] always returns exactly one [`ResultRecord`].
//! Every stage failure (unreadable PDF, no QR, every fetch strategy failing)
//! is logged and folded into the record's flags and `error` field, so a
//! batch of N certificates yields N records.
//!
//! ```text
//! bytes ──▶ degenerate or unreadable? ──yes──▶ error record
//!             │ no
//!             ▼
//!          PdfScan ──▶ UrlLocator ──▶ url?
//!             │                        │ yes
//!             ▼                        ▼
//!       pdf_* fields        cache ─miss─▶ FetchChain ─▶ visible text ─▶ web_* fields
//!                                                                   └─▶ cache.store
//! ```

use crate::cache::{CachedScrape, ScrapeCache};
use crate::config::ScraperConfig;
use crate::error::{CsfError, DocumentError};
use crate::pipeline::document::{scan_document, PdfBackend, PdfScan, PdfiumBackend, ScanOptions};
use crate::pipeline::extract::{url_fields, PatternSet};
use crate::pipeline::fetch::FetchChain;
use crate::pipeline::input::{is_degenerate, Document};
use crate::pipeline::locate::UrlLocator;
use crate::pipeline::normalize::{collapse_whitespace, html_tables, visible_text};
use crate::record::ResultRecord;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the full pipeline for one certificate at a time.
///
/// Cheap to share: wrap in an `Arc` to drive it from several tasks. All
/// per-session state lives in the injected [`ScrapeCache`].
pub struct Processor {
    config: ScraperConfig,
    backend: Arc<dyn PdfBackend>,
    locator: UrlLocator,
    pdf_patterns: PatternSet,
    web_patterns: PatternSet,
    chain: FetchChain,
    cache: Arc<ScrapeCache>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("cached_urls", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// A processor over libpdfium and the four standard fetch strategies.
    ///
    /// # Errors
    /// [`CsfError::PdfiumBindingFailed`] when libpdfium cannot be found,
    /// [`CsfError::HttpClientBuild`] when a strategy's client cannot be built.
    pub fn new(config: ScraperConfig, cache: Arc<ScrapeCache>) -> Result<Self, CsfError> {
        let backend = Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone())?);
        let chain = FetchChain::standard(&config)?;
        Self::with_parts(config, backend, chain, cache)
    }

    /// A processor over caller-supplied PDF backend and fetch chain.
    pub fn with_parts(
        config: ScraperConfig,
        backend: Arc<dyn PdfBackend>,
        chain: FetchChain,
        cache: Arc<ScrapeCache>,
    ) -> Result<Self, CsfError> {
        Ok(Self {
            locator: UrlLocator::from_config(&config)?,
            pdf_patterns: PatternSet::pdf()?.with_threshold(config.pdf_field_threshold),
            web_patterns: PatternSet::web()?.with_threshold(config.web_field_threshold),
            config,
            backend,
            chain,
            cache,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ScrapeCache> {
        &self.cache
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            render_scale: self.config.render_scale,
            max_text_pages: self.config.max_text_pages,
        }
    }

    /// Process one certificate given as bytes plus display name.
    pub async fn process_pdf(&self, bytes: &[u8], filename: &str) -> ResultRecord {
        self.process_document(Document::new(filename, bytes.to_vec()))
            .await
    }

    /// Process one [`Document`], consuming it.
    pub async fn process_document(&self, document: Document) -> ResultRecord {
        let started = Instant::now();
        let Document { name, bytes } = document;
        let mut record = ResultRecord::new(&name);

        // ── Step 1: Reject degenerate input ──────────────────────────────
        if is_degenerate(&bytes, self.config.min_pdf_bytes) {
            warn!("{}: {} bytes, rejected as degenerate", name, bytes.len());
            record.error = Some(DocumentError::InvalidInput.to_string());
            return record;
        }

        // ── Step 2: Scan the PDF once ────────────────────────────────────
        let scan = match scan_document(Arc::clone(&self.backend), bytes, self.scan_options()).await
        {
            Ok(scan) => scan,
            Err(e @ CsfError::CorruptPdf { .. }) => {
                warn!("{}: {}", name, e);
                record.error = Some(DocumentError::InvalidInput.to_string());
                return record;
            }
            Err(e) => {
                warn!("{}: {}", name, e);
                PdfScan::default()
            }
        };

        // ── Step 3: Locate the validator URL ─────────────────────────────
        let located = self.locator.locate(&scan);

        // ── Step 4: PDF text-layer fields, regardless of the URL ─────────
        if self.config.pdf_extraction {
            let pdf_fields = self.pdf_patterns.extract(&collapse_whitespace(&scan.text));
            record.extraccion_pdf_exitosa = !pdf_fields.is_empty();
            record.merge_fields(pdf_fields);
        }

        // ── Step 5: Validator page ───────────────────────────────────────
        match located {
            None => record.error = Some(DocumentError::QrNotFound.to_string()),
            Some(found) => {
                record.url_encontrada = true;
                record.url = found.url.clone();

                if !self.config.web_scraping {
                    record.error = Some(DocumentError::WebScrapingDisabled.to_string());
                } else {
                    match self.scrape(&found.url, &name).await {
                        Some(entry) => {
                            record.scraping_exitoso = entry.scraping_exitoso;
                            record.merge_fields(entry.fields);
                        }
                        None => {
                            record.merge_fields(url_fields(&found.url));
                            record.error = Some(DocumentError::FetchFailed.to_string());
                        }
                    }
                }
            }
        }

        info!(
            "{}: url={} pdf={} web={} ({} fields, {}ms)",
            name,
            record.url_encontrada,
            record.extraccion_pdf_exitosa,
            record.scraping_exitoso,
            record.fields.len(),
            started.elapsed().as_millis()
        );
        record
    }

    /// Cached scrape, else fetch and parse the page and cache the result.
    async fn scrape(&self, url: &str, filename: &str) -> Option<CachedScrape> {
        if let Some(hit) = self.cache.lookup(url, filename) {
            return Some(hit);
        }

        let outcome = self.chain.fetch(url).await?;
        let text = visible_text(&outcome.body);
        let mut fields = self.web_patterns.extract(&text);
        fields.extend(html_tables(&outcome.body));
        // Page values take precedence over the URL's own parameters.
        for (k, v) in url_fields(url) {
            fields.entry(k).or_insert(v);
        }
        debug!(
            "{}: {} web field(s) from '{}'",
            filename,
            fields.len(),
            outcome.strategy
        );

        let entry = CachedScrape::new(url, fields);
        self.cache.store(url, entry.clone());
        Some(CachedScrape {
            archivo_pdf: filename.to_string(),
            ..entry
        })
    }

    /// Process a batch, at most `concurrency` documents at a time.
    ///
    /// Records come back in input order. Progress events go to the
    /// configured callback.
    pub async fn process_batch(&self, documents: Vec<Document>) -> Vec<ResultRecord> {
        let total = documents.len();
        let callback = self.config.progress_callback.clone();
        if let Some(ref cb) = callback {
            cb.on_batch_start(total);
        }

        let records: Vec<ResultRecord> =
            stream::iter(documents.into_iter().enumerate().map(|(index, doc)| {
                let callback = callback.clone();
                async move {
                    let name = doc.name.clone();
                    if let Some(ref cb) = callback {
                        cb.on_document_start(index, total, &name);
                    }
                    let record = self.process_document(doc).await;
                    if let Some(ref cb) = callback {
                        cb.on_document_complete(index, total, &name, record.scraping_exitoso);
                    }
                    record
                }
            }))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let scraped = records.iter().filter(|r| r.scraping_exitoso).count();
        info!("Batch complete: {}/{} scraped", scraped, total);
        if let Some(ref cb) = callback {
            cb.on_batch_complete(total, scraped);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::FetchStrategy;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct CannedBackend(PdfScan);

    impl PdfBackend for CannedBackend {
        fn scan(&self, _bytes: &[u8], _options: &ScanOptions) -> Result<PdfScan, CsfError> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl PdfBackend for FailingBackend {
        fn scan(&self, _bytes: &[u8], _options: &ScanOptions) -> Result<PdfScan, CsfError> {
            Err(CsfError::CorruptPdf {
                detail: "bad xref".into(),
            })
        }
    }

    struct Fixed(Option<&'static str>);

    impl FetchStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Option<String>> {
            let body = self.0.map(str::to_string);
            async move { body }.boxed()
        }
    }

    const URL: &str = "https://siat.sat.gob.mx/app/qr/faces/pages/mobile/validadorqr.jsf?D1=10&D2=1&D3=12345678901_GODE561231GR8";
    const PAGE: &str = "<html><body><p>CURP: GODE561231HDFRRN04</p><p>CP: 06000</p></body></html>";

    fn processor(backend: Arc<dyn PdfBackend>, body: Option<&'static str>, web: bool) -> Processor {
        let config = ScraperConfig::builder().web_scraping(web).build().unwrap();
        let chain = FetchChain::new(vec![Arc::new(Fixed(body))]);
        Processor::with_parts(config, backend, chain, Arc::new(ScrapeCache::new())).unwrap()
    }

    fn scan_with_url() -> PdfScan {
        PdfScan {
            page_count: 1,
            link_uris: vec![URL.into()],
            text: "RFC: GODE561231GR8\nCURP: GODE561231HDFRRN04".into(),
            ..PdfScan::default()
        }
    }

    fn pdf_bytes() -> Vec<u8> {
        let mut b = b"%PDF-1.4\n".to_vec();
        b.resize(200, b' ');
        b
    }

    #[tokio::test]
    async fn degenerate_input_short_circuits() {
        let p = processor(Arc::new(CannedBackend(scan_with_url())), Some(PAGE), true);
        let r = p.process_pdf(&[0u8; 50], "tiny.pdf").await;
        assert_eq!(r.error.as_deref(), Some("PDF vacío o inválido"));
        assert!(!r.url_encontrada && !r.extraccion_pdf_exitosa && !r.scraping_exitoso);
        assert!(r.fields.is_empty());
    }

    #[tokio::test]
    async fn full_success() {
        let p = processor(Arc::new(CannedBackend(scan_with_url())), Some(PAGE), true);
        let r = p.process_pdf(&pdf_bytes(), "a.pdf").await;
        assert!(r.url_encontrada && r.extraccion_pdf_exitosa && r.scraping_exitoso);
        assert_eq!(r.url, URL);
        assert!(r.error.is_none());
        assert_eq!(r.get("pdf_rfc"), Some("GODE561231GR8"));
        assert_eq!(r.get("web_curp"), Some("GODE561231HDFRRN04"));
        assert_eq!(r.get("web_cp"), Some("06000"));
        assert_eq!(r.get("web_numero_registro"), Some("12345678901"));
    }

    #[tokio::test]
    async fn fetch_failure_is_distinct_from_missing_qr() {
        let p = processor(Arc::new(CannedBackend(scan_with_url())), None, true);
        let r = p.process_pdf(&pdf_bytes(), "a.pdf").await;
        assert!(r.url_encontrada && !r.scraping_exitoso);
        assert_eq!(
            r.error.as_deref(),
            Some("No se pudo acceder al contenido con ninguna estrategia")
        );
        assert_eq!(r.get("web_rfc"), Some("GODE561231GR8"));
        assert!(p.cache().is_empty());
    }

    #[tokio::test]
    async fn unreadable_pdf_is_an_input_defect() {
        let p = processor(Arc::new(FailingBackend), Some(PAGE), true);
        let r = p.process_pdf(&vec![b'Z'; 4096], "a.pdf").await;
        assert_eq!(r.error.as_deref(), Some("PDF vacío o inválido"));
        assert_eq!(r.url, crate::record::URL_NOT_FOUND);
        assert!(!r.url_encontrada);
        assert!(!r.extraccion_pdf_exitosa);
        assert!(!r.scraping_exitoso);
    }

    #[tokio::test]
    async fn web_scraping_switched_off() {
        let p = processor(Arc::new(CannedBackend(scan_with_url())), Some(PAGE), false);
        let r = p.process_pdf(&pdf_bytes(), "a.pdf").await;
        assert!(r.url_encontrada && !r.scraping_exitoso);
        assert_eq!(r.error.as_deref(), Some("Scraping web deshabilitado"));
        assert!(r.fields_with_prefix("web_").next().is_none());
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let p = processor(Arc::new(CannedBackend(scan_with_url())), Some(PAGE), true);
        let docs = vec![
            Document::new("one.pdf", pdf_bytes()),
            Document::new("two.pdf", vec![1, 2, 3]),
            Document::new("three.pdf", pdf_bytes()),
        ];
        let records = p.process_batch(docs).await;
        let names: Vec<_> = records.iter().map(|r| r.archivo_pdf.as_str()).collect();
        assert_eq!(names, vec!["one.pdf", "two.pdf", "three.pdf"]);
        assert!(records[1].error.is_some());
    }
}
