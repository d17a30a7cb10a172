//! CLI binary for sat-csf-scraper.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScraperConfig`, runs the batch and writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sat_csf_scraper::pipeline::input::collect_pdf_paths;
use sat_csf_scraper::report::write_records_json;
use sat_csf_scraper::{
    build_report, BatchProgressCallback, Document, ProgressCallback, Processor, ResultRecord,
    ScrapeCache, ScraperConfig, TlsPolicy,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar plus a log line per certificate.
/// Documents may complete out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-document wall-clock start times, keyed by batch index.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Documents whose web scraping did not succeed.
    unscraped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Scraping");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            unscraped: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} certificate(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, name: &str, scraped: bool) {
        let secs = self.elapsed_secs(index);
        let mark = if scraped {
            green("✓")
        } else {
            self.unscraped.fetch_add(1, Ordering::SeqCst);
            red("✗")
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            mark,
            index + 1,
            total,
            name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, scraped_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.unscraped.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} certificate(s) scraped successfully",
                green("✔"),
                bold(&scraped_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} certificate(s) scraped  ({} without web data)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&scraped_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scrape one certificate, records to stdout
  csf-scrape constancia.pdf

  # A whole directory, records and the four-sheet report to files
  csf-scrape ./constancias -o records.json --report report.json

  # Text layer only, no network
  csf-scrape --no-web constancia.pdf

  # Keep full TLS verification
  csf-scrape --strict-tls constancia.pdf

OUTPUT:
  One JSON record per input PDF, in input order. Status fields are always
  present (archivo_pdf, fecha_extraccion, url_encontrada, url,
  extraccion_pdf_exitosa, scraping_exitoso, error); extracted values use
  pdf_* and web_* keys.

ENVIRONMENT VARIABLES:
  CSF_OUTPUT, CSF_REPORT, CSF_CONCURRENCY, CSF_TIMEOUT, CSF_NO_WEB, CSF_NO_PDF,
  CSF_STRICT_TLS, CSF_PDFIUM_PATH, CSF_NO_PROGRESS, CSF_VERBOSE, CSF_QUIET
  RUST_LOG                Overrides the log filter (e.g. sat_csf_scraper=debug)

SETUP:
  libpdfium must be available: next to the binary, on the system library
  path, or in the directory given with --pdfium-path. The `curl` executable
  is optional; without it the command-line fetch strategy is skipped.
"#;

/// Extract taxpayer data from SAT tax-status certificates.
#[derive(Parser, Debug)]
#[command(
    name = "csf-scrape",
    version,
    about = "Extract taxpayer data from SAT tax-status certificate PDFs",
    long_about = "Decode the QR code of each Constancia de Situación Fiscal, fetch the SAT \
validator page it points at, and extract structured fields from both the PDF text layer \
and the page into one JSON record per file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, or directories whose *.pdf files are processed.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the JSON records to this file instead of stdout.
    #[arg(short, long, env = "CSF_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write the four-sheet report (JSON) to this file.
    #[arg(long, env = "CSF_REPORT")]
    report: Option<PathBuf>,

    /// Number of certificates processed concurrently.
    #[arg(short, long, env = "CSF_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Per-strategy request timeout in seconds.
    #[arg(long, env = "CSF_TIMEOUT", default_value_t = 15)]
    timeout: u64,

    /// Skip fetching the validator page.
    #[arg(long, env = "CSF_NO_WEB")]
    no_web: bool,

    /// Skip text-layer field extraction.
    #[arg(long, env = "CSF_NO_PDF")]
    no_pdf: bool,

    /// Verify certificates and hostnames, TLS 1.2 or newer.
    #[arg(long, env = "CSF_STRICT_TLS")]
    strict_tls: bool,

    /// Directory containing libpdfium.
    #[arg(long, env = "CSF_PDFIUM_PATH")]
    pdfium_path: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "CSF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CSF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CSF_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read inputs ──────────────────────────────────────────────────────
    let paths = collect_pdf_paths(&cli.inputs).context("Failed to resolve inputs")?;
    if paths.is_empty() {
        anyhow::bail!("No PDF files found in the given inputs");
    }
    let documents = paths
        .iter()
        .map(|p| Document::from_path(p).with_context(|| format!("Failed to read {:?}", p)))
        .collect::<Result<Vec<_>>>()?;

    // ── Build processor ──────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let processor = Processor::new(config, Arc::new(ScrapeCache::new()))
        .context("Failed to initialise the scraper")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let records = processor.process_batch(documents).await;

    // ── Write results ────────────────────────────────────────────────────
    match cli.output {
        Some(ref path) => write_records_json(&records, path)
            .await
            .context("Failed to write records")?,
        None => println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to serialise records")?
        ),
    }

    if let Some(ref path) = cli.report {
        build_report(&records)
            .context("Failed to build report")?
            .write_json(path)
            .await
            .context("Failed to write report")?;
    }

    if !cli.quiet {
        print_summary(&cli, &records, started.elapsed());
    }
    Ok(())
}

/// Map CLI args to `ScraperConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScraperConfig> {
    let mut builder = ScraperConfig::builder()
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout)
        .web_scraping(!cli.no_web)
        .pdf_extraction(!cli.no_pdf)
        .tls(if cli.strict_tls {
            TlsPolicy::strict()
        } else {
            TlsPolicy::relaxed()
        });

    if let Some(ref dir) = cli.pdfium_path {
        builder = builder.pdfium_library_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(cli: &Cli, records: &[ResultRecord], elapsed: Duration) {
    let total = records.len();
    let urls = records.iter().filter(|r| r.url_encontrada).count();
    let pdf = records.iter().filter(|r| r.extraccion_pdf_exitosa).count();
    let web = records.iter().filter(|r| r.scraping_exitoso).count();

    eprintln!(
        "{}  {} PDF(s)  QR {}/{}  PDF {}/{}  web {}/{}  {:.1}s",
        if web == total { green("✔") } else { cyan("⚠") },
        total,
        urls,
        total,
        pdf,
        total,
        web,
        total,
        elapsed.as_secs_f64(),
    );
    for path in [&cli.output, &cli.report].into_iter().flatten() {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}
