//! Message stores: where already-parsed messages come from.
//!
//! The reply index is built from exactly one full scan of a store
//! (`for_each_message`); point lookups exist for ad-hoc inspection and for
//! callers that walk a store directly.

use crate::concurrency::map_files_limited;
use crate::jsonl::{for_each_line, total_size};
use crate::model::{AuthorId, Message, MessageId};
use crate::paths::InputFile;
use crate::progress::ProgressScope;
use crate::tweet::{parse_message, Rejected};
use ahash::AHashMap;
use anyhow::Result;
use serde::Serialize;

/// Counters from one full scan of a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Records handed to the caller.
    pub records: u64,
    /// Lines that were not JSON objects.
    pub malformed: u64,
    /// JSON objects without a usable message id (e.g. stream delete notices).
    pub missing_id: u64,
    /// Messages without a usable author id.
    pub missing_author: u64,
}

impl ScanStats {
    pub fn rejected(&self) -> u64 {
        self.malformed + self.missing_id + self.missing_author
    }

    pub fn merge(&mut self, other: ScanStats) {
        self.records += other.records;
        self.malformed += other.malformed;
        self.missing_id += other.missing_id;
        self.missing_author += other.missing_author;
    }

    fn reject(&mut self, why: Rejected) {
        match why {
            Rejected::Unparseable => self.malformed += 1,
            Rejected::MissingId => self.missing_id += 1,
            Rejected::MissingAuthor => self.missing_author += 1,
        }
    }
}

/// Read access to a message universe.
pub trait MessageStore {
    fn get_by_id(&self, id: MessageId) -> Result<Option<Message>>;
    fn get_replies_to(&self, id: MessageId) -> Result<Vec<Message>>;
    fn get_by_author(&self, author: AuthorId) -> Result<Vec<Message>>;
    /// Visit every message once, in the store's natural order.
    fn for_each_message(&self, on_message: &mut dyn FnMut(Message)) -> Result<ScanStats>;
}

// ----------------------------- in memory ------------------------------------

/// Store over an owned list of messages. Insertion order is the scan order.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    messages: Vec<Message>,
    by_id: AHashMap<MessageId, usize>,
    replies: AHashMap<MessageId, Vec<usize>>,
    by_author: AHashMap<AuthorId, Vec<usize>>,
}

impl MemoryStore {
    pub fn new<I: IntoIterator<Item = Message>>(messages: I) -> Self {
        let mut s = Self::default();
        for m in messages { s.push(m); }
        s
    }

    pub fn push(&mut self, m: Message) {
        let idx = self.messages.len();
        self.by_id.entry(m.id).or_insert(idx);
        if let Some(p) = m.parent {
            self.replies.entry(p).or_default().push(idx);
        }
        self.by_author.entry(m.author).or_default().push(idx);
        self.messages.push(m);
    }

    pub fn len(&self) -> usize { self.messages.len() }
    pub fn is_empty(&self) -> bool { self.messages.is_empty() }
}

impl FromIterator<Message> for MemoryStore {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self { Self::new(iter) }
}

impl MessageStore for MemoryStore {
    fn get_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.by_id.get(&id).map(|&i| self.messages[i].clone()))
    }

    fn get_replies_to(&self, id: MessageId) -> Result<Vec<Message>> {
        Ok(self
            .replies
            .get(&id)
            .map(|v| v.iter().map(|&i| self.messages[i].clone()).collect())
            .unwrap_or_default())
    }

    fn get_by_author(&self, author: AuthorId) -> Result<Vec<Message>> {
        Ok(self
            .by_author
            .get(&author)
            .map(|v| v.iter().map(|&i| self.messages[i].clone()).collect())
            .unwrap_or_default())
    }

    fn for_each_message(&self, on_message: &mut dyn FnMut(Message)) -> Result<ScanStats> {
        for m in &self.messages {
            on_message(m.clone());
        }
        Ok(ScanStats { records: self.messages.len() as u64, ..Default::default() })
    }
}

// ----------------------------- flat files ------------------------------------

/// Store over newline-delimited JSON files (plain or zstd).
///
/// Nothing is cached: a full scan parses files in parallel (bounded by
/// `file_concurrency`) and replays them in path order. Point lookups are full
/// scans; build a `ReplyIndex` for anything traversal-heavy.
#[derive(Clone, Debug)]
pub struct JsonlStore {
    files: Vec<InputFile>,
    read_buf_bytes: usize,
    file_concurrency: usize,
    progress: bool,
}

impl JsonlStore {
    pub fn new(files: Vec<InputFile>) -> Self {
        Self { files, read_buf_bytes: 256 * 1024, file_concurrency: 1, progress: false }
    }

    pub fn read_buffer(mut self, bytes: usize) -> Self { self.read_buf_bytes = bytes.max(8 * 1024); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.file_concurrency = n.max(1); self }
    pub fn progress(mut self, yes: bool) -> Self { self.progress = yes; self }

    pub fn files(&self) -> &[InputFile] { &self.files }

    /// Parse a single file into messages plus its rejection counters.
    fn parse_file(&self, file: &InputFile, pb: &ProgressScope) -> Result<(Vec<Message>, ScanStats)> {
        let mut out = Vec::new();
        let mut stats = ScanStats::default();
        for_each_line(file, self.read_buf_bytes, |d| pb.inc(d), |line| {
            let parsed = std::str::from_utf8(line).map_err(|_| Rejected::Unparseable).and_then(parse_message);
            match parsed {
                Ok(m) => {
                    stats.records += 1;
                    out.push(m);
                }
                Err(why) => {
                    tracing::debug!(path = %file.path.display(), ?why, "skipping record");
                    stats.reject(why);
                }
            }
            Ok(())
        })?;
        Ok((out, stats))
    }

    fn scan_filtered(&self, mut keep: impl FnMut(&Message) -> bool) -> Result<Vec<Message>> {
        let mut hits = Vec::new();
        self.for_each_message(&mut |m| if keep(&m) { hits.push(m) })?;
        Ok(hits)
    }
}

impl MessageStore for JsonlStore {
    fn get_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.scan_filtered(|m| m.id == id)?.into_iter().next())
    }

    fn get_replies_to(&self, id: MessageId) -> Result<Vec<Message>> {
        self.scan_filtered(|m| m.parent == Some(id))
    }

    fn get_by_author(&self, author: AuthorId) -> Result<Vec<Message>> {
        self.scan_filtered(|m| m.author == author)
    }

    fn for_each_message(&self, on_message: &mut dyn FnMut(Message)) -> Result<ScanStats> {
        let pb = ProgressScope::bytes(self.progress, "Reading messages", total_size(&self.files));
        let parsed = map_files_limited(&self.files, self.file_concurrency, |f| self.parse_file(f, &pb))?;
        let mut total = ScanStats::default();
        for (messages, stats) in parsed {
            total.merge(stats);
            for m in messages {
                on_message(m);
            }
        }
        pb.finish(format!("{} messages ({} rejected)", total.records, total.rejected()));
        Ok(total)
    }
}
