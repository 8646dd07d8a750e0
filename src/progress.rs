//! Progress reporting: byte bars for ingestion, count bars for seed processing.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Optional global MultiProgress so several bars can render at once.
static GLOBAL_MP: OnceLock<Arc<MultiProgress>> = OnceLock::new();

/// Install a global MultiProgress used by all subsequently created bars.
/// Additional calls are ignored.
pub fn set_global_multiprogress(mp: Arc<MultiProgress>) {
    let _ = GLOBAL_MP.set(mp);
}

fn new_bar(total: u64) -> ProgressBar {
    if let Some(mp) = GLOBAL_MP.get() {
        mp.add(ProgressBar::new(total))
    } else {
        ProgressBar::new(total)
    }
}

fn styled(total: u64, template: &str) -> ProgressBar {
    let pb = new_bar(total);
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Thin wrapper over an `indicatif` bar that may be disabled.
/// A disabled scope accepts every call and draws nothing.
#[derive(Clone)]
pub struct ProgressScope {
    pb: Option<ProgressBar>,
}

impl ProgressScope {
    pub fn disabled() -> Self { Self { pb: None } }

    pub fn bytes(enabled: bool, label: impl Into<String>, total_bytes: u64) -> Self {
        if !enabled { return Self::disabled(); }
        let pb = styled(
            total_bytes,
            "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
             {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
        );
        pb.set_message(label.into());
        Self { pb: Some(pb) }
    }

    pub fn count(enabled: bool, label: impl Into<String>, total: u64) -> Self {
        if !enabled { return Self::disabled(); }
        let pb = styled(
            total,
            "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
             it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
        );
        pb.set_message(label.into());
        Self { pb: Some(pb) }
    }

    #[inline]
    pub fn inc(&self, delta: u64) {
        if let Some(pb) = &self.pb { pb.inc(delta); }
    }

    pub fn finish(&self, msg: impl Into<String>) {
        if let Some(pb) = &self.pb { pb.finish_with_message(msg.into()); }
    }
}
