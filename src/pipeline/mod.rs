//! Pipeline stages for certificate scraping.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the orchestrator swap
//! implementations (a canned PDF backend, mock fetch strategies) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ locate ──▶ fetch ──▶ normalize ──▶ extract
//! (bytes)   (pdfium)     (QR/URL)   (HTTP)    (encoding)    (regex tiers)
//! ```
//!
//! 1. [`input`]: read certificates from disk into `(name, bytes)` pairs
//! 2. [`document`]: one pdfium pass per document; runs in `spawn_blocking`
//! 3. [`locate`]: recover the validator URL (QR, links, text, images)
//! 4. [`fetch`]: the only stage with network I/O; ordered strategies
//! 5. [`normalize`]: visible text, mojibake repair, HTML tables
//! 6. [`extract`]: primary/alternate pattern tiers from [`patterns`]
//!
//! [`chain`] holds the "first success wins" loop shared by 3 and 4.

pub mod chain;
pub mod document;
pub mod extract;
pub mod fetch;
pub mod input;
pub mod locate;
pub mod normalize;
pub mod patterns;
