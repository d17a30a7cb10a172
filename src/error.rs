//! Error types for the sat-csf-scraper library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CsfError`]: **Fatal**: the session cannot be set up or the outer
//!   surface cannot do its job (pdfium missing, HTTP client cannot be built,
//!   report requested for an empty batch). Returned as `Err(CsfError)`.
//!
//! * [`DocumentError`]: **Non-fatal**: one certificate could not be fully
//!   processed (no QR, every fetch strategy failed). Its display text is
//!   written into [`crate::record::ResultRecord::error`] so that a batch of
//!   N inputs always yields N records.
//!
//! The orchestrator never returns `CsfError` for a per-document problem;
//! stage failures are logged and downgraded to "no result from this stage".

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sat-csf-scraper library.
#[derive(Debug, Error)]
pub enum CsfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium-render returned an error while rendering the first page.
    #[error("Rasterisation failed: {detail}")]
    RasterisationFailed { detail: String },

    // ── Network errors ────────────────────────────────────────────────────
    /// A fetch strategy's HTTP client could not be constructed.
    #[error("Failed to build HTTP client for strategy '{strategy}': {reason}")]
    HttpClientBuild { strategy: &'static str, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field-extraction pattern failed to compile.
    #[error("Invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    // ── Report errors ─────────────────────────────────────────────────────
    /// A report was requested for zero records.
    #[error("No results to export: the batch is empty")]
    EmptyBatch,

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide,\n\
or pass --pdfium-path /dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single certificate.
///
/// The `Display` strings are part of the output schema: downstream reports
/// group and filter on them, so they stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Empty or implausibly small byte content.
    #[error("PDF vacío o inválido")]
    InvalidInput,

    /// No QR payload and no fallback URL could be recovered.
    #[error("No se pudo extraer código QR")]
    QrNotFound,

    /// A URL was found but every fetch strategy failed.
    #[error("No se pudo acceder al contenido con ninguna estrategia")]
    FetchFailed,

    /// A URL was found but web scraping is switched off.
    #[error("Scraping web deshabilitado")]
    WebScrapingDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_error_messages_are_distinct() {
        let all = [
            DocumentError::InvalidInput,
            DocumentError::QrNotFound,
            DocumentError::FetchFailed,
            DocumentError::WebScrapingDisabled,
        ];
        let msgs: std::collections::HashSet<String> = all.iter().map(|e| e.to_string()).collect();
        assert_eq!(msgs.len(), all.len());
    }

    #[test]
    fn qr_and_fetch_errors_display() {
        assert_eq!(DocumentError::QrNotFound.to_string(), "No se pudo extraer código QR");
        assert!(DocumentError::FetchFailed.to_string().contains("ninguna estrategia"));
    }

    #[test]
    fn records_carry_the_display_text() {
        let mut record = crate::record::ResultRecord::new("a.pdf");
        record.error = Some(DocumentError::InvalidInput.to_string());
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["error"], "PDF vacío o inválido");
    }

    #[test]
    fn http_client_build_display() {
        let e = CsfError::HttpClientBuild {
            strategy: "browser-session",
            reason: "no tls backend".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("browser-session"), "got: {msg}");
        assert!(msg.contains("no tls backend"), "got: {msg}");
    }

    #[test]
    fn empty_batch_display() {
        assert!(CsfError::EmptyBatch.to_string().contains("empty"));
    }
}
