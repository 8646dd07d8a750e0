//! Input discovery: find the JSONL files (plain or zstd) that make up a batch.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Encoding of an input file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Plain, // .json / .jsonl / .ndjson
    Zstd,  // .zst / .jsonl.zst
}

#[derive(Clone, Debug)]
pub struct InputFile {
    pub kind: FileKind,
    pub path: PathBuf,
}

impl InputFile {
    /// Classify a single path by extension. `None` for anything else.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let caps = name_re().captures(name)?;
        let kind = if caps[1].eq_ignore_ascii_case("zst") { FileKind::Zstd } else { FileKind::Plain };
        Some(Self { kind, path: path.to_path_buf() })
    }
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[^.].*\.(json|jsonl|ndjson|zst)$").expect("static regex")
    })
}

/// Discover input files under `dir`, sorted by path so batches are reproducible.
/// Hidden files are ignored. With `recursive == false` only direct children are considered.
pub fn discover_inputs(dir: &Path, recursive: bool) -> Vec<InputFile> {
    let mut out = Vec::new();
    if !dir.exists() {
        return out;
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    for ent in WalkDir::new(dir).min_depth(1).max_depth(max_depth).into_iter().flatten() {
        if !ent.file_type().is_file() { continue; }
        if let Some(f) = InputFile::from_path(ent.path()) {
            out.push(f);
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}
