//! "First success wins" over an ordered list of stages.
//!
//! The locator stages and the fetch strategies are both best-effort chains:
//! try each in order, stop at the first that produces a value, treat any
//! failure as "nothing from this stage". Both run through these two
//! functions so the iteration and its logging live in one place.

use std::future::Future;
use tracing::debug;

/// Something that can be named in chain logs.
pub trait Labelled {
    fn label(&self) -> &str;
}

/// Run `attempt` on each stage in order; return the index and value of the
/// first `Some`. Later stages are not attempted.
pub fn first_success<S, T, F>(chain: &str, stages: &[S], mut attempt: F) -> Option<(usize, T)>
where
    S: Labelled,
    F: FnMut(&S) -> Option<T>,
{
    for (i, stage) in stages.iter().enumerate() {
        if let Some(value) = attempt(stage) {
            debug!("{}: stage '{}' succeeded", chain, stage.label());
            return Some((i, value));
        }
        debug!("{}: stage '{}' yielded nothing", chain, stage.label());
    }
    debug!("{}: all {} stages exhausted", chain, stages.len());
    None
}

/// Async counterpart of [`first_success`]. Stages run strictly one after
/// another.
pub async fn first_success_async<'s, S, T, F, Fut>(
    chain: &str,
    stages: &'s [S],
    mut attempt: F,
) -> Option<(usize, T)>
where
    S: Labelled,
    F: FnMut(&'s S) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for (i, stage) in stages.iter().enumerate() {
        if let Some(value) = attempt(stage).await {
            debug!("{}: stage '{}' succeeded", chain, stage.label());
            return Some((i, value));
        }
        debug!("{}: stage '{}' yielded nothing", chain, stage.label());
    }
    debug!("{}: all {} stages exhausted", chain, stages.len());
    None
}
