//! Concurrency helper: limit the number of input files decoded in parallel.

use crate::paths::InputFile;
use anyhow::Result;
use rayon::prelude::*;

/// Run `f` over every file with at most `limit` files in flight and return the
/// results in input order, so downstream merging stays deterministic.
pub fn map_files_limited<T, F>(files: &[InputFile], limit: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Sync + Fn(&InputFile) -> Result<T>,
{
    let mut out = Vec::with_capacity(files.len());
    if limit <= 1 {
        for file in files {
            out.push(f(file)?);
        }
        return Ok(out);
    }
    for chunk in files.chunks(limit) {
        let part: Vec<T> = chunk.par_iter().map(|file| f(file)).collect::<Result<Vec<_>>>()?;
        out.extend(part);
    }
    Ok(out)
}
