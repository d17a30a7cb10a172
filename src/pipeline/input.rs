//! Input ingestion: turn user-supplied paths into in-memory [`Document`]s.
//!
//! ## Why bytes, not paths?
//!
//! Certificates usually arrive through an upload layer that never touches
//! the filesystem. The orchestrator therefore works on `(bytes, name)`
//! pairs; this module is only the thin adapter the command-line surface uses
//! to read them from disk. Error mapping mirrors what a user can act on:
//! a missing file and a permission problem are reported differently.

use crate::error::CsfError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One input certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display filename, written to `archivo_pdf`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a document from disk; the name is the path's file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CsfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => CsfError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => CsfError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        if !has_pdf_magic(&bytes) {
            // Still processed: the orchestrator turns it into an error record.
            warn!("{} does not start with %PDF", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read {} ({} bytes)", name, bytes.len());
        Ok(Self { name, bytes })
    }
}

/// Empty or shorter than `min_bytes`: not worth handing to pdfium.
pub fn is_degenerate(bytes: &[u8], min_bytes: usize) -> bool {
    bytes.is_empty() || bytes.len() < min_bytes
}

/// Whether the buffer starts with the `%PDF` signature.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Expand user inputs into a list of files.
///
/// Files are kept as given; directories contribute their direct `*.pdf`
/// children (case-insensitive extension), sorted by path. Nonexistent
/// inputs are an error.
pub fn collect_pdf_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CsfError> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => CsfError::PermissionDenied {
                    path: input.clone(),
                },
                _ => CsfError::FileNotFound {
                    path: input.clone(),
                },
            })?;
            let mut pdfs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_pdf_extension(p))
                .collect();
            pdfs.sort();
            debug!("{}: {} PDF(s)", input.display(), pdfs.len());
            out.extend(pdfs);
        } else if input.exists() {
            out.push(input.clone());
        } else {
            return Err(CsfError::FileNotFound {
                path: input.clone(),
            });
        }
    }
    Ok(out)
}

fn is_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
