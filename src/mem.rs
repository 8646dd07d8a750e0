//! Memory watch for ingestion. The reply index lives entirely in RAM, so
//! readers back off while the machine is short on memory and the loader
//! reports how much headroom was left once the index is built.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

/// Below this available fraction, line readers pause between records.
pub const INGEST_LOW_WATER: f64 = 0.10;

const REFRESH_EVERY: Duration = Duration::from_millis(500);
const PAUSE: Duration = Duration::from_millis(25);

struct Sampler {
    sys: System,
    sampled_at: Instant,
    available: f64,
}

static SAMPLER: OnceLock<Mutex<Sampler>> = OnceLock::new();
static WARNED: AtomicBool = AtomicBool::new(false);

/// Available / total RAM in `0.0..=1.0`, resampled at most every 500ms.
pub fn available_memory_fraction() -> f64 {
    let cell = SAMPLER.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_memory();
        Mutex::new(Sampler { sys, sampled_at: Instant::now() - REFRESH_EVERY * 2, available: 1.0 })
    });
    let mut s = cell.lock();
    if s.sampled_at.elapsed() >= REFRESH_EVERY {
        s.sys.refresh_memory();
        let total = s.sys.total_memory() as f64;
        s.available = if total > 0.0 { (s.sys.available_memory() as f64 / total).clamp(0.0, 1.0) } else { 1.0 };
        s.sampled_at = Instant::now();
    }
    s.available
}

pub fn is_low_memory(threshold: f64) -> bool {
    available_memory_fraction() < threshold
}

/// Called once per ingested record. Pauses briefly under [`INGEST_LOW_WATER`]
/// and warns the first time that happens in a process.
pub fn throttle_ingest() {
    if !is_low_memory(INGEST_LOW_WATER) {
        return;
    }
    if !WARNED.swap(true, Ordering::Relaxed) {
        tracing::warn!(
            available = available_memory_fraction(),
            "memory is low while indexing; consider the per-account component loader"
        );
    }
    std::thread::sleep(PAUSE);
}
