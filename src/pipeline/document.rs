//! PDF access: everything the pipeline needs from a certificate, read in
//! one open/close of the document.
//!
//! ## Why a single scan?
//!
//! pdfium parses the whole cross-reference table on load. Opening the
//! document once and pulling the first-page raster, link annotations, text
//! and embedded images in the same pass keeps the per-document cost to one
//! parse. The `PdfDocument` handle is owned by the scanning function, so it
//! is dropped (and pdfium's handle closed) on every exit path, early returns
//! included.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! [`scan_document`] moves the work onto Tokio's blocking pool so the
//! worker threads keep serving network I/O.
//!
//! ## Why a trait?
//!
//! [`PdfBackend`] lets the orchestrator run without libpdfium (tests inject
//! a canned [`PdfScan`]).

use crate::error::CsfError;
use image::GrayImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to read from the document.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Upscaling factor for the first-page raster.
    pub render_scale: f32,
    /// Leading pages whose text is collected; `None` for all.
    pub max_text_pages: Option<usize>,
}

/// An image object embedded in the first page.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Greyscale rendition for QR decoding.
    pub gray: GrayImage,
    /// The image stream exactly as stored in the PDF, filters not applied.
    /// Encoder metadata (JPEG comments, XMP) survives here, which is where
    /// byte-level URL search looks.
    pub bytes: Vec<u8>,
}

/// Raw material extracted from one certificate.
///
/// Every part is best-effort: a part pdfium could not produce is left empty
/// and the rest of the scan is still returned.
#[derive(Debug, Clone, Default)]
pub struct PdfScan {
    pub page_count: usize,
    /// First page rendered at [`ScanOptions::render_scale`], greyscale.
    pub first_page: Option<GrayImage>,
    /// URIs of the first page's link annotations.
    pub link_uris: Vec<String>,
    /// Raw text of the first page.
    pub first_page_text: String,
    /// Raw text of the selected pages, one page per line block.
    pub text: String,
    /// Image objects found on the first page.
    pub embedded_images: Vec<EmbeddedImage>,
}

/// Source of [`PdfScan`]s.
///
/// Implementations are called from a blocking thread.
pub trait PdfBackend: Send + Sync {
    /// Parse `bytes` and extract a scan. `Err` only when the document
    /// cannot be opened at all.
    fn scan(&self, bytes: &[u8], options: &ScanOptions) -> Result<PdfScan, CsfError>;
}

/// Run a backend scan on the blocking pool.
pub async fn scan_document(
    backend: Arc<dyn PdfBackend>,
    bytes: Vec<u8>,
    options: ScanOptions,
) -> Result<PdfScan, CsfError> {
    tokio::task::spawn_blocking(move || backend.scan(&bytes, &options))
        .await
        .map_err(|e| CsfError::Internal(format!("PDF scan task panicked: {}", e)))?
}

// ── pdfium implementation ────────────────────────────────────────────────

/// [`PdfBackend`] over the pdfium C library.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Locate libpdfium in `library_dir`, or in `./` then the system search
    /// path. Fails early if no library can be bound.
    pub fn new(library_dir: Option<PathBuf>) -> Result<Self, CsfError> {
        let backend = Self { library_dir };
        backend.bind()?;
        Ok(backend)
    }

    fn bind(&self) -> Result<Pdfium, CsfError> {
        let bindings = match self.library_dir {
            Some(ref dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| CsfError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn scan(&self, bytes: &[u8], options: &ScanOptions) -> Result<PdfScan, CsfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| CsfError::CorruptPdf {
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let page_count = pages.len() as usize;
        let mut scan = PdfScan {
            page_count,
            ..PdfScan::default()
        };
        if page_count == 0 {
            return Ok(scan);
        }

        // ── First page: raster, links, text, images ─────────────────────
        match pages.get(0) {
            Ok(page) => {
                scan.first_page = render_gray(&page, options.render_scale);
                scan.link_uris = link_uris(&page);
                scan.first_page_text = page_text(&page);
                scan.embedded_images = embedded_images(&page);
            }
            Err(e) => warn!("First page unavailable: {:?}", e),
        }

        // ── Text layer of the selected pages ────────────────────────────
        let take = options.max_text_pages.unwrap_or(page_count).min(page_count);
        scan.text = join_page_texts(
            &scan.first_page_text,
            pages.iter().skip(1).map(|page| page_text(&page)),
            take,
        );

        debug!(
            "Scanned PDF: {} pages, raster={}, {} links, {} images, {} text chars",
            page_count,
            scan.first_page.is_some(),
            scan.link_uris.len(),
            scan.embedded_images.len(),
            scan.text.len()
        );
        Ok(scan)
    }
}

/// Concatenate the first `take` page texts, one block per page. Page 0's
/// text was already extracted for the locator and is reused as is.
fn join_page_texts(
    first_page_text: &str,
    later_pages: impl Iterator<Item = String>,
    take: usize,
) -> String {
    let mut text = String::new();
    if take == 0 {
        return text;
    }
    text.push_str(first_page_text);
    text.push('\n');
    for page in later_pages.take(take - 1) {
        text.push_str(&page);
        text.push('\n');
    }
    text
}

fn render_gray(page: &PdfPage, scale: f32) -> Option<GrayImage> {
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    match page.render_with_config(&config) {
        Ok(bitmap) => Some(bitmap.as_image().to_luma8()),
        Err(e) => {
            warn!(
                "{}",
                CsfError::RasterisationFailed {
                    detail: format!("{:?}", e)
                }
            );
            None
        }
    }
}

fn link_uris(page: &PdfPage) -> Vec<String> {
    page.links()
        .iter()
        .filter_map(|link| match link.action() {
            Some(PdfAction::Uri(action)) => action.uri().ok(),
            _ => None,
        })
        .collect()
}

fn page_text(page: &PdfPage) -> String {
    match page.text() {
        Ok(text) => text.all(),
        Err(e) => {
            debug!("Text layer unavailable: {:?}", e);
            String::new()
        }
    }
}

fn embedded_images(page: &PdfPage) -> Vec<EmbeddedImage> {
    page.objects()
        .iter()
        .filter_map(|object| {
            let object = object.as_image_object()?;
            let gray = object.get_raw_image().ok()?.to_luma8();
            let bytes = match object.get_raw_image_data() {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Image stream unavailable: {:?}", e);
                    Vec::new()
                }
            };
            Some(EmbeddedImage { gray, bytes })
        })
        .collect()
}
