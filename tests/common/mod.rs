#![allow(dead_code)]

use serde_json::json;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use threadmine::{
    BatchReport, ConversationSink, Message, MessageId, ReplyIndex, SupportAccounts, ThreadMiner, VecSink,
};

/// KLM
pub const SUPPORT: u64 = 56377143;
/// AirFrance, a second support account
pub const OTHER_SUPPORT: u64 = 106062176;
pub const U1: u64 = 1001;
pub const U2: u64 = 1002;
pub const U3: u64 = 1003;

/// Message at `t` seconds (stored as milliseconds).
pub fn msg(id: u64, author: u64, parent: Option<u64>, t: i64) -> Message {
    Message::new(id, author, parent).at(t * 1000)
}

pub fn support() -> SupportAccounts {
    SupportAccounts::from_ids([SUPPORT, OTHER_SUPPORT])
}

/// Miner with both support accounts, no progress bars.
pub fn quiet_miner() -> ThreadMiner {
    ThreadMiner::new().support(support()).progress(false)
}

pub fn ids(v: &[u64]) -> Vec<MessageId> {
    v.iter().copied().map(MessageId).collect()
}

/// Run `miner` over `index` into a `VecSink`; returns the chronological id lists.
pub fn run_ids(miner: &ThreadMiner, index: &ReplyIndex) -> (Vec<Vec<MessageId>>, BatchReport) {
    let mut sink = VecSink::new();
    let report = miner.run(index, &mut sink as &mut dyn ConversationSink).unwrap();
    (sink.id_lists(), report)
}

/// A streaming-API style tweet line.
pub fn tweet_line(id: u64, user: u64, screen_name: &str, parent: Option<u64>, created_at: &str, text: &str) -> String {
    json!({
        "created_at": created_at,
        "id": id,
        "id_str": id.to_string(),
        "text": text,
        "in_reply_to_status_id": parent,
        "in_reply_to_status_id_str": parent.map(|p| p.to_string()),
        "user": { "id": user, "id_str": user.to_string(), "screen_name": screen_name },
        "lang": "en"
    })
    .to_string()
}

pub fn temp_base() -> PathBuf {
    tempfile::tempdir().unwrap().into_path()
}

/// Write a compressed `.zst` file containing the provided JSONL lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

pub fn write_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Read a text file line-by-line into strings, skipping empty lines.
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Small file corpus with one two-party exchange and one third-party intrusion:
/// - 10 (U1 "alice", root)
/// - 11 (KLM -> 10)
/// - 12 (U1 -> 11)
/// - 13 (U2 "bob" -> 11), pruned from the conversation
///
/// 10 and 11 go into a plain `.jsonl`, 12 and 13 into a `.zst`.
pub fn make_corpus_basic() -> PathBuf {
    let base = temp_base();
    write_lines(
        &base.join("part-0.jsonl"),
        &[
            tweet_line(10, U1, "alice", None, "Mon Oct 01 10:00:00 +0000 2018", "my bag is lost"),
            tweet_line(11, SUPPORT, "KLM", Some(10), "Mon Oct 01 10:05:00 +0000 2018", "sorry to hear\nplease DM"),
        ],
    );
    write_zst_lines(
        &base.join("part-1.jsonl.zst"),
        &[
            tweet_line(12, U1, "alice", Some(11), "Mon Oct 01 10:10:00 +0000 2018", "sent"),
            tweet_line(13, U2, "bob", Some(11), "Mon Oct 01 10:11:00 +0000 2018", "same here"),
        ],
    );
    base
}

/// Add a file with a correct name but invalid contents (plain text, not zstd).
pub fn add_corrupt_zst(base: &Path) {
    let corrupt = base.join("part-2.zst");
    let mut f = File::create(corrupt).unwrap();
    writeln!(&mut f, "{{\"id\":99,\"user\":{{\"id\":1}}}}").unwrap();
}

/// Deterministic pseudo-random reply forest for invariant checks.
/// Authors are drawn from both support accounts and five public users;
/// parents point at earlier ids, sometimes at ids that do not exist.
pub fn synthetic_forest(n: u64, seed: u64) -> Vec<Message> {
    synthetic_forest_with(n, seed, &[SUPPORT, OTHER_SUPPORT, U1, U2, U3, 1004, 1005], 0)
}

/// Same shape as [`synthetic_forest`] with a chosen author pool and ids
/// starting at `id_offset + 1`. Forests with offsets more than `n + 50` apart
/// share no ids.
pub fn synthetic_forest_with(n: u64, seed: u64, authors: &[u64], id_offset: u64) -> Vec<Message> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        state >> 33
    };
    let mut out = Vec::with_capacity(n as usize);
    for i in 1..=n {
        let author = authors[(next() % authors.len() as u64) as usize];
        let parent = match next() % 10 {
            0 | 1 => None,
            2 => Some(n + 1 + next() % 50), // outside the batch
            _ if i > 1 => Some(1 + next() % (i - 1)),
            _ => None,
        };
        out.push(msg(id_offset + i, author, parent.map(|p| id_offset + p), (id_offset + i) as i64));
    }
    out
}
