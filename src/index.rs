//! Reply-graph index: id -> message and parent -> direct replies, built once per batch.

use crate::model::{AuthorId, Message, MessageId, SupportAccounts};
use crate::store::{MessageStore, ScanStats};
use ahash::AHashMap;
use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Distinct messages kept.
    pub messages: u64,
    /// Records dropped because their id was already indexed (first write wins).
    pub duplicates: u64,
    /// Messages without a parent reference.
    pub roots: u64,
    /// Replies whose parent is not part of this batch.
    pub orphans: u64,
}

/// Read-only lookup structures for graph walks.
///
/// Duplicate ids keep the first record seen. Child lists are ordered by
/// `(created_at, id)`, so two builds over any permutation of the same
/// (duplicate-free) input are identical.
#[derive(Debug, Default)]
pub struct ReplyIndex {
    by_id: AHashMap<MessageId, Message>,
    children: AHashMap<MessageId, Vec<MessageId>>,
    stats: IndexStats,
}

impl ReplyIndex {
    pub fn build<I: IntoIterator<Item = Message>>(messages: I) -> Self {
        let mut b = IndexBuilder::default();
        for m in messages {
            b.push(m);
        }
        b.finish()
    }

    /// One full scan of `store`.
    pub fn from_store(store: &dyn MessageStore) -> Result<(Self, ScanStats)> {
        let mut b = IndexBuilder::default();
        let scan = store.for_each_message(&mut |m| b.push(m))?;
        Ok((b.finish(), scan))
    }

    #[inline]
    pub fn get(&self, id: MessageId) -> Option<&Message> { self.by_id.get(&id) }

    #[inline]
    pub fn contains(&self, id: MessageId) -> bool { self.by_id.contains_key(&id) }

    #[inline]
    pub fn author_of(&self, id: MessageId) -> Option<AuthorId> { self.by_id.get(&id).map(|m| m.author) }

    /// Direct replies to `id` in `(created_at, id)` order.
    #[inline]
    pub fn replies_to(&self, id: MessageId) -> &[MessageId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize { self.by_id.len() }
    pub fn is_empty(&self) -> bool { self.by_id.is_empty() }
    pub fn stats(&self) -> IndexStats { self.stats }

    /// Candidate seeds: replies authored by a support account, oldest first.
    pub fn seeds(&self, support: &SupportAccounts) -> Vec<MessageId> {
        let mut v: Vec<&Message> = self
            .by_id
            .values()
            .filter(|m| m.parent.is_some() && support.contains(m.author))
            .collect();
        v.sort_by_key(|m| m.time_key());
        v.into_iter().map(|m| m.id).collect()
    }

    /// Same maps, same order: what the idempotence checks compare.
    pub fn same_structure(&self, other: &ReplyIndex) -> bool {
        *self.by_id == *other.by_id && *self.children == *other.children
    }
}

#[derive(Default)]
struct IndexBuilder {
    by_id: AHashMap<MessageId, Message>,
    children: AHashMap<MessageId, Vec<MessageId>>,
    duplicates: u64,
}

impl IndexBuilder {
    fn push(&mut self, m: Message) {
        if self.by_id.contains_key(&m.id) {
            self.duplicates += 1;
            return;
        }
        if let Some(p) = m.parent {
            self.children.entry(p).or_default().push(m.id);
        }
        self.by_id.insert(m.id, m);
    }

    fn finish(self) -> ReplyIndex {
        let IndexBuilder { by_id, mut children, duplicates } = self;
        for kids in children.values_mut() {
            // stable: equal keys keep insertion order
            kids.sort_by_key(|id| by_id.get(id).map(Message::time_key).unwrap_or((i64::MIN, id.0)));
        }
        let mut stats = IndexStats { messages: by_id.len() as u64, duplicates, ..Default::default() };
        for m in by_id.values() {
            match m.parent {
                None => stats.roots += 1,
                Some(p) if !by_id.contains_key(&p) => stats.orphans += 1,
                Some(_) => {}
            }
        }
        ReplyIndex { by_id, children, stats }
    }
}
