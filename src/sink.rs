//! Conversation sinks: where emitted conversations go.

use crate::assemble::Conversation;
use crate::index::ReplyIndex;
use crate::model::{AuthorId, Message, MessageId};
use crate::output::LineOutput;
use crate::tweet::clean_text;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// A conversation as handed to a sink: ids in chronological order plus the
/// full message records, so sinks never need the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmittedConversation {
    /// 1-based emission number within the run.
    pub seq: u64,
    pub seed: MessageId,
    pub original_author: AuthorId,
    pub support_account: AuthorId,
    pub anchor: MessageId,
    pub message_ids: Vec<MessageId>,
    pub messages: Vec<Message>,
}

impl EmittedConversation {
    pub fn new(seq: u64, c: &Conversation, index: &ReplyIndex) -> Self {
        let message_ids = c.chronological(index);
        let messages = message_ids.iter().filter_map(|id| index.get(*id).cloned()).collect();
        Self {
            seq,
            seed: c.seed,
            original_author: c.original_author,
            support_account: c.support_account,
            anchor: c.anchor,
            message_ids,
            messages,
        }
    }

    /// Screen name of `author` as it appears on any message here.
    pub fn screen_name_of(&self, author: AuthorId) -> Option<&str> {
        self.messages
            .iter()
            .filter(|m| m.author == author)
            .find_map(|m| m.author_name.as_deref())
    }
}

/// Receives conversations in emission order.
pub trait ConversationSink {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()>;
    /// Flush and release. Called once at the end of a run, even after an early stop.
    fn finish(&mut self) -> Result<()> { Ok(()) }
}

/// Collects everything in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub conversations: Vec<EmittedConversation>,
}

impl VecSink {
    pub fn new() -> Self { Self::default() }

    /// Message-id lists only, in emission order.
    pub fn id_lists(&self) -> Vec<Vec<MessageId>> {
        self.conversations.iter().map(|c| c.message_ids.clone()).collect()
    }
}

impl ConversationSink for VecSink {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()> {
        self.conversations.push(c.clone());
        Ok(())
    }
}

/// One JSON object per line.
pub struct NdjsonSink {
    out: LineOutput,
}

impl NdjsonSink {
    pub fn create(path: &Path, buf_bytes: usize) -> Result<Self> {
        Ok(Self { out: LineOutput::create(path, buf_bytes)? })
    }

    pub fn stdout() -> Self { Self { out: LineOutput::stdout() } }
}

impl ConversationSink for NdjsonSink {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()> {
        let line = serde_json::to_string(c)?;
        self.out.write_line(&line).context("write conversation")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> { self.out.finish() }
}

/// Human-readable transcript, one block per conversation. Message text is
/// flattened to a single line whatever store it came from.
pub struct TextSink {
    out: LineOutput,
}

impl TextSink {
    pub fn create(path: &Path, buf_bytes: usize) -> Result<Self> {
        Ok(Self { out: LineOutput::create(path, buf_bytes)? })
    }

    pub fn stdout() -> Self { Self { out: LineOutput::stdout() } }

    fn write_block(&mut self, c: &EmittedConversation) -> std::io::Result<()> {
        let support = match c.screen_name_of(c.support_account) {
            Some(name) => name.to_string(),
            None => c.support_account.to_string(),
        };
        self.out.write_line("")?;
        self.out.write_line(&format!("--- Conversation {} Start (@{}) ---", c.seq, support))?;
        for m in &c.messages {
            let who = match &m.author_name {
                Some(name) => name.clone(),
                None => m.author.to_string(),
            };
            self.out.write_line(&format!("(Time: {}) @{}: {}", m.created_at.unwrap_or(0), who, clean_text(&m.text)))?;
        }
        self.out.write_line("--- Conversation End ---")
    }
}

impl ConversationSink for TextSink {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()> {
        self.write_block(c).context("write transcript")
    }

    fn finish(&mut self) -> Result<()> { self.out.finish() }
}

/// Fan out to several sinks in order.
#[derive(Default)]
pub struct TeeSink<'a> {
    sinks: Vec<&'a mut dyn ConversationSink>,
}

impl<'a> TeeSink<'a> {
    pub fn new() -> Self { Self { sinks: Vec::new() } }

    pub fn push(&mut self, sink: &'a mut dyn ConversationSink) { self.sinks.push(sink); }
}

impl ConversationSink for TeeSink<'_> {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()> {
        for s in self.sinks.iter_mut() {
            s.emit(c)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for s in self.sinks.iter_mut() {
            s.finish()?;
        }
        Ok(())
    }
}
