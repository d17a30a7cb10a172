//! Streaming batch API: emit records as documents complete.
//!
//! ## Why stream?
//!
//! A batch of certificates can take minutes when the validator is slow.
//! Unlike [`crate::process::Processor::process_batch`], which returns only
//! after every document finishes and keeps input order, [`process_stream`]
//! yields each [`ResultRecord`] as soon as it is ready. Records may arrive
//! out of input order; match them up by `archivo_pdf` if order matters.

use crate::pipeline::input::Document;
use crate::process::Processor;
use crate::record::ResultRecord;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of result records.
pub type RecordStream = Pin<Box<dyn Stream<Item = ResultRecord> + Send>>;

/// Process `documents`, at most `concurrency` at a time, yielding records in
/// completion order.
///
/// The stream owns its [`Processor`] handle, so it can outlive the caller's
/// borrow and be moved to another task.
///
/// # Example
/// ```rust,no_run
/// use sat_csf_scraper::{process_stream, Document, Processor, ScrapeCache, ScraperConfig};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = Arc::new(Processor::new(
///     ScraperConfig::default(),
///     Arc::new(ScrapeCache::new()),
/// )?);
/// let docs = vec![Document::from_path("csf.pdf")?];
/// let mut records = process_stream(processor, docs);
/// while let Some(record) = records.next().await {
///     println!("{}: scraped={}", record.archivo_pdf, record.scraping_exitoso);
/// }
/// # Ok(())
/// # }
/// ```
pub fn process_stream(processor: Arc<Processor>, documents: Vec<Document>) -> RecordStream {
    let concurrency = processor.config().concurrency.max(1);
    info!(
        "Streaming {} document(s), concurrency {}",
        documents.len(),
        concurrency
    );

    let s = stream::iter(documents.into_iter().map(move |doc| {
        let processor = Arc::clone(&processor);
        async move { processor.process_document(doc).await }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
