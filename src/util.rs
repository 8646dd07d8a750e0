use crate::model::{AuthorId, SupportAccounts};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- support accounts from env/file --------

/// Merge extra support accounts from the environment into `target`.
/// - THREADMINE_SUPPORT_IDS: comma/semicolon/space separated numeric ids
/// - THREADMINE_SUPPORT_FILE: one entry per line, either `id` or `name=id`; `#` starts a comment
/// Entries that do not parse are logged and ignored.
pub fn merge_support_from_env(target: &mut SupportAccounts) {
    if let Ok(s) = std::env::var("THREADMINE_SUPPORT_IDS") {
        for raw in s.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
            let raw = raw.trim();
            if raw.is_empty() { continue; }
            match raw.parse::<AuthorId>() {
                Ok(id) => target.insert(id),
                Err(_) => tracing::warn!("THREADMINE_SUPPORT_IDS: ignoring non-numeric entry {:?}", raw),
            }
        }
    }

    if let Ok(path) = std::env::var("THREADMINE_SUPPORT_FILE") {
        if path.trim().is_empty() { return; }
        match File::open(&path) {
            Ok(f) => {
                for line in BufReader::new(f).lines().map_while(|l| l.ok()) {
                    merge_support_line(target, &line);
                }
            }
            Err(_) => tracing::warn!("THREADMINE_SUPPORT_FILE is set but cannot be opened: {}", path),
        }
    }
}

fn merge_support_line(target: &mut SupportAccounts, line: &str) {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() { return; }
    match line.split_once('=') {
        Some((name, id)) => match id.parse::<AuthorId>() {
            Ok(id) => target.insert_named(name, id),
            Err(_) => tracing::warn!("support file: bad id in {:?}", line),
        },
        None => match line.parse::<AuthorId>() {
            Ok(id) => target.insert(id),
            Err(_) => tracing::warn!("support file: bad entry {:?}", line),
        },
    }
}

// -------- file ops with backoff (AV scanners, network shares, sharing violations) --------

/// Transient Windows error codes worth retrying:
/// 5 access denied, 21 device not ready, 32 sharing violation, 33 lock violation,
/// 1224 user-mapped section open.
fn is_retriable_io_error(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(5) | Some(21) | Some(32) | Some(33) | Some(1224))
}

/// Run `op` up to `tries` times, sleeping linearly longer after each retriable failure.
fn with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let tries = tries.max(1);
    let mut attempt = 0usize;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) && attempt + 1 < tries => {
                attempt += 1;
                sleep(Duration::from_millis(delay_ms.saturating_mul(attempt as u64)));
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Replace `dest` with `tmp`. Falls back to copy + remove when rename is refused.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let (tries, delay_ms) = (20usize, 50u64);
    if dest.exists() {
        with_backoff(tries, delay_ms, || match fs::remove_file(dest) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        })
        .with_context(|| format!("remove {}", dest.display()))?;
    }
    if with_backoff(tries, delay_ms, || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    with_backoff(tries, delay_ms, || fs::remove_file(tmp))
        .with_context(|| format!("remove {}", tmp.display()))?;
    Ok(())
}
