//! Conversation assembly: one seed in, one validated conversation (or a skip reason) out.

use crate::ancestors::walk_up;
use crate::descendants::collect_down;
use crate::index::ReplyIndex;
use crate::model::{AuthorId, MessageId, SupportAccounts};
use crate::policy::{Participants, ThreadPolicy};
use crate::seen::SeenIds;
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Why a seed did not produce a conversation. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Seed id is not in the index.
    UnknownSeed,
    /// Seed author is not a support account.
    NotSupport,
    /// Seed is not a reply.
    NoParent,
    /// The message the seed replies to is not part of this batch.
    ParentMissing,
    /// The seed replies to another support account.
    NoCounterpart,
    /// A third author appears in the collected messages.
    ThirdParty,
    /// Missing the support side or the public side.
    NotTwoParty,
    /// The seed itself already belongs to an emitted conversation.
    AlreadyClaimed,
    /// Some other collected id already belongs to an emitted conversation.
    Overlap,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnknownSeed => "unknown_seed",
            SkipReason::NotSupport => "not_support",
            SkipReason::NoParent => "no_parent",
            SkipReason::ParentMissing => "parent_missing",
            SkipReason::NoCounterpart => "no_counterpart",
            SkipReason::ThirdParty => "third_party",
            SkipReason::NotTwoParty => "not_two_party",
            SkipReason::AlreadyClaimed => "already_claimed",
            SkipReason::Overlap => "overlap",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// An assembled two-party exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub seed: MessageId,
    pub support_account: AuthorId,
    pub original_author: AuthorId,
    /// Message the exchange hangs off: the support-authored ancestor when one
    /// was searched for and found, else the message the seed replies to.
    pub anchor: MessageId,
    /// Assembly order: upstream context (oldest first), parent, seed, replies (BFS).
    pub messages: Vec<MessageId>,
}

impl Conversation {
    /// Ids by `created_at`; ties and missing timestamps keep assembly order.
    pub fn chronological(&self, index: &ReplyIndex) -> Vec<MessageId> {
        let mut ids = self.messages.clone();
        ids.sort_by_key(|id| index.get(*id).and_then(|m| m.created_at).unwrap_or(i64::MIN));
        ids
    }

    pub fn authors(&self, index: &ReplyIndex) -> BTreeSet<AuthorId> {
        self.messages.iter().filter_map(|id| index.author_of(*id)).collect()
    }
}

/// Builds conversations from seeds against a read-only index.
#[derive(Clone, Copy)]
pub struct Assembler<'a> {
    index: &'a ReplyIndex,
    support: &'a SupportAccounts,
    policy: ThreadPolicy,
}

impl<'a> Assembler<'a> {
    pub fn new(index: &'a ReplyIndex, support: &'a SupportAccounts, policy: ThreadPolicy) -> Self {
        Self { index, support, policy }
    }

    pub fn index(&self) -> &'a ReplyIndex { self.index }

    /// Walk, collect and validate without touching any seen-id set.
    pub fn candidate(&self, seed_id: MessageId) -> Result<Conversation, SkipReason> {
        let seed = self.index.get(seed_id).ok_or(SkipReason::UnknownSeed)?;
        if !self.support.contains(seed.author) {
            return Err(SkipReason::NotSupport);
        }
        let parent_id = seed.parent.ok_or(SkipReason::NoParent)?;
        let parent = self.index.get(parent_id).ok_or(SkipReason::ParentMissing)?;
        if self.support.contains(parent.author) {
            return Err(SkipReason::NoCounterpart);
        }

        let parties = Participants {
            support_account: seed.author,
            original_author: parent.author,
            support: self.support,
            admission: self.policy.admission,
        };

        let ancestry = walk_up(self.index, parent_id, &parties, self.policy.ancestors);
        let replies = collect_down(self.index, seed_id, &parties, &self.policy.descendants);

        // A cyclic graph can surface the same id on both walks.
        let mut messages = Vec::with_capacity(ancestry.ids.len() + 2 + replies.len());
        let mut placed: AHashSet<MessageId> = AHashSet::new();
        for id in ancestry.ids.iter().copied().chain([parent_id, seed_id]).chain(replies) {
            if placed.insert(id) {
                messages.push(id);
            }
        }

        self.validate(&parties, &messages)?;

        Ok(Conversation {
            seed: seed_id,
            support_account: parties.support_account,
            original_author: parties.original_author,
            anchor: ancestry.anchor.unwrap_or(parent_id),
            messages,
        })
    }

    /// Strict two-party check over every collected message.
    fn validate(&self, parties: &Participants<'_>, messages: &[MessageId]) -> Result<(), SkipReason> {
        let mut has_support = false;
        let mut has_public = false;
        for id in messages {
            let Some(author) = self.index.author_of(*id) else { continue };
            if !parties.is_pair(author) {
                return Err(SkipReason::ThirdParty);
            }
            if self.support.contains(author) {
                has_support = true;
            } else {
                has_public = true;
            }
        }
        if has_support && has_public { Ok(()) } else { Err(SkipReason::NotTwoParty) }
    }

    /// Full per-seed assembly: candidate, then claim.
    pub fn assemble(&self, seed_id: MessageId, seen: &mut impl SeenIds) -> Result<Conversation, SkipReason> {
        let c = self.candidate(seed_id)?;
        claim(c, seen)
    }
}

/// First-assembled wins: a candidate touching any claimed id is dropped whole.
pub fn claim(c: Conversation, seen: &mut impl SeenIds) -> Result<Conversation, SkipReason> {
    if seen.is_claimed(c.seed) {
        return Err(SkipReason::AlreadyClaimed);
    }
    if seen.try_claim(&c.messages) { Ok(c) } else { Err(SkipReason::Overlap) }
}
