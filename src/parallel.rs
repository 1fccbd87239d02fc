//! Per-ballot data-parallel map with optional progress reporting
//! (`spec.md` §2 component 7, §5 "orchestration harness").
//!
//! Every per-ballot step of the tally engine (converting representations,
//! reweighting) is embarrassingly parallel: each ballot is immutable and
//! independent, and only the public key / key ring are shared, read-only
//! state. `rayon` provides the worker pool, `indicatif` the progress bar —
//! the same pairing `auryn-macmillan-fhe-workshop/src/main.rs` uses for its
//! per-voter encryption and tally loops.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::trace;

use crate::error::Result;

/// Controls whether [`par_map`]/[`try_par_map`] render a progress bar.
/// Disabled by default: a library should not assume it owns a terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgressConfig {
    pub enabled: bool,
}

fn make_bar(len: usize, label: &str, progress: &ProgressConfig) -> Option<ProgressBar> {
    if !progress.enabled {
        return None;
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("progress bar template is valid")
            .progress_chars("=>-"),
    );
    bar.set_message(label.to_string());
    Some(bar)
}

/// Maps `f` over `items` in parallel, ticking a progress bar if enabled.
pub fn par_map<T, U, F>(items: &[T], progress: &ProgressConfig, label: &str, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    trace!(items = items.len(), label, "dispatching parallel map");
    let bar = make_bar(items.len(), label, progress);
    let results: Vec<U> = items
        .par_iter()
        .map(|item| {
            let result = f(item);
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            result
        })
        .collect();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    results
}

/// As [`par_map`], for fallible per-item work; stops reporting success at the
/// first error but still lets every item run (errors here indicate a bug or
/// malformed input, not a condition worth short-circuiting the workers for).
pub fn try_par_map<T, U, F>(
    items: &[T],
    progress: &ProgressConfig,
    label: &str,
    f: F,
) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Sync + Send,
{
    trace!(items = items.len(), label, "dispatching fallible parallel map");
    let bar = make_bar(items.len(), label, progress);
    let results: Vec<Result<U>> = items
        .par_iter()
        .map(|item| {
            let result = f(item);
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            result
        })
        .collect();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    results.into_iter().collect()
}

/// Runs `work` on a dedicated `n_threads`-sized rayon pool when given, or on
/// the global pool when `n_threads` is `None`.
pub fn with_thread_pool<R>(n_threads: Option<usize>, work: impl FnOnce() -> R + Send) -> R
where
    R: Send,
{
    match n_threads {
        Some(n) => {
            trace!(n_threads = n, "building a scoped rayon pool for this tally run");
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("building a scoped rayon pool with a valid thread count")
                .install(work)
        }
        None => work(),
    }
}
