//! Line streaming over plain or zstd-compressed JSONL inputs.
//!
//! A file that fails mid-decode (truncated or corrupt zstd frame) is logged and
//! skipped; whatever lines were delivered before the failure stay delivered.

use crate::mem::throttle_ingest;
use crate::paths::{FileKind, InputFile};
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// Large frames in archive dumps need a wide decoder window.
const WINDOW_LOG_MAX: u32 = 31;

#[inline]
fn warn_skip(path: &Path, e: &anyhow::Error) {
    let abs = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    tracing::warn!(
        path = %abs.display(),
        error = %e,
        "skipping rest of input file after read/decode error; records read so far are kept"
    );
}

/// A `Read` wrapper that counts raw (on-disk) bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Stream `file` line by line as raw bytes; UTF-8 validation is left to the
/// caller so one bad line costs one record. `on_progress` receives on-disk
/// byte deltas. Callback errors abort and propagate; I/O and decode errors
/// skip the file.
pub fn for_each_line(
    file: &InputFile,
    read_buf_bytes: usize,
    mut on_progress: impl FnMut(u64),
    mut on_line: impl FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let mut callback_failed = false;
    let res = stream_lines(file, read_buf_bytes, &mut on_progress, &mut |line: &[u8]| {
        on_line(line).map_err(|e| {
            callback_failed = true;
            e
        })
    });
    match res {
        Ok(()) => Ok(()),
        Err(e) if callback_failed => Err(e),
        Err(e) => {
            warn_skip(&file.path, &e);
            if let Ok(meta) = fs::metadata(&file.path) {
                on_progress(meta.len());
            }
            Ok(())
        }
    }
}

fn stream_lines(
    file: &InputFile,
    read_buf_bytes: usize,
    on_progress: &mut impl FnMut(u64),
    on_line: &mut impl FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let f = open_with_backoff(&file.path, 16, 50)
        .with_context(|| format!("open {}", file.path.display()))?;
    let counter = Arc::new(AtomicU64::new(0));
    let counted = CountingReader { inner: f, counter: counter.clone() };
    let cap = read_buf_bytes.max(8 * 1024);

    let mut reader: Box<dyn BufRead> = match file.kind {
        FileKind::Plain => Box::new(BufReader::with_capacity(cap, counted)),
        FileKind::Zstd => {
            let mut decoder = Decoder::new(counted)?;
            decoder.window_log_max(WINDOW_LOG_MAX)?;
            Box::new(BufReader::with_capacity(cap, decoder))
        }
    };

    let mut buf: Vec<u8> = Vec::with_capacity(16 * 1024);
    let mut last = 0u64;
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        let cur = counter.load(Ordering::Relaxed);
        if cur > last {
            on_progress(cur - last);
            last = cur;
        }
        if n == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') { buf.pop(); }
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        on_line(&buf[..])?;
        throttle_ingest();
    }
    Ok(())
}

/// Total on-disk size of the inputs, for byte progress bars.
pub fn total_size(files: &[InputFile]) -> u64 {
    files
        .iter()
        .map(|f| fs::metadata(&f.path).map(|m| m.len()).unwrap_or(0))
        .sum()
}
