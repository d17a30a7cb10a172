//! Session-scoped memo of successful validator scrapes.
//!
//! ## Why an explicit object?
//!
//! Several certificates in one batch often resolve to the same validator URL
//! (re-issued or duplicated PDFs). A [`ScrapeCache`] is constructed once per
//! processing session and handed to the [`crate::process::Processor`] by
//! `Arc`, so its lifetime is visible at the call site and two sessions never
//! share entries by accident.
//!
//! ## Invariants
//!
//! * Only successful scrapes are stored; a transient network fault never
//!   poisons later documents that resolve to the same URL.
//! * Entries are never replaced or expired: the first writer wins.
//! * Lookups hand out copies whose `archivo_pdf` is the requesting
//!   document's name, never the stored placeholder.

use crate::pipeline::extract::FieldMap;
use crate::record::CACHED_FILENAME;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// The filename-independent part of a successful scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedScrape {
    /// [`CACHED_FILENAME`] while stored; the requester's name once handed out.
    pub archivo_pdf: String,
    pub url: String,
    pub scraping_exitoso: bool,
    /// `web_*` fields extracted from the page.
    pub fields: FieldMap,
}

impl CachedScrape {
    pub fn new(url: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            archivo_pdf: CACHED_FILENAME.to_string(),
            url: url.into(),
            scraping_exitoso: true,
            fields,
        }
    }
}

/// Deterministic cache key: lowercase hex SHA-256 of the URL string.
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Thread-safe, process-lifetime scrape cache.
#[derive(Debug, Default)]
pub struct ScrapeCache {
    entries: Mutex<HashMap<String, CachedScrape>>,
}

impl ScrapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the map itself intact.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedScrape>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A copy of the entry for `url`, renamed to `filename`.
    pub fn lookup(&self, url: &str, filename: &str) -> Option<CachedScrape> {
        let key = cache_key(url);
        let hit = self.entries().get(&key).cloned()?;
        info!("Cache hit for {} ({})", filename, &key[..12]);
        Some(CachedScrape {
            archivo_pdf: filename.to_string(),
            ..hit
        })
    }

    /// Store a successful scrape. Unsuccessful entries and URLs already
    /// present are ignored. Returns whether the entry was inserted.
    pub fn store(&self, url: &str, mut entry: CachedScrape) -> bool {
        if !entry.scraping_exitoso {
            debug!("Not caching unsuccessful scrape of {}", url);
            return false;
        }
        entry.archivo_pdf = CACHED_FILENAME.to_string();

        let key = cache_key(url);
        let mut entries = self.entries();
        if entries.contains_key(&key) {
            debug!("Cache already holds {}", &key[..12]);
            return false;
        }
        debug!("Caching {} web field(s) under {}", entry.fields.len(), &key[..12]);
        entries.insert(key, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }
}
