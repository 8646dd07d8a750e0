use crate::util::{create_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered line output, either to stdout or to a file.
///
/// File output is written to `<dest>.tmp` and promoted to `dest` on `finish`,
/// so an interrupted run never leaves a half-written result at `dest`.
pub struct LineOutput {
    w: Option<Box<dyn Write + Send>>,
    promote: Option<(PathBuf, PathBuf)>,
}

impl LineOutput {
    pub fn create(dest: &Path, buf_bytes: usize) -> Result<Self> {
        let tmp = tmp_path_for(dest);
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        Ok(Self {
            w: Some(Box::new(BufWriter::with_capacity(buf_bytes.max(8 * 1024), f))),
            promote: Some((tmp, dest.to_path_buf())),
        })
    }

    pub fn stdout() -> Self {
        Self { w: Some(Box::new(BufWriter::new(io::stdout()))), promote: None }
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        if let Some(w) = &mut self.w {
            w.write_all(s.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flush and, for file output, move the temp file into place. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut w) = self.w.take() {
            w.flush().context("flush output")?;
        }
        if let Some((tmp, dest)) = self.promote.take() {
            replace_file_atomic_backoff(&tmp, &dest)?;
        }
        Ok(())
    }
}

fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}
