//! Traversal policies. Every variant is an explicit configuration; nothing is
//! inferred from the data.

use crate::model::{AuthorId, SupportAccounts};
use serde::Serialize;

/// How far upstream context is collected above the message a seed replies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AncestorPolicy {
    /// Admit parents while their author is a participant; stop at the first
    /// outsider, after `max_depth` hops (if set), or at an unresolved parent.
    Participants { max_depth: Option<usize> },
    /// Walk past non-support authors until a support-authored parent is found.
    /// That parent anchors the conversation and ends the walk.
    FirstSupportMention,
}

impl Default for AncestorPolicy {
    fn default() -> Self { AncestorPolicy::Participants { max_depth: None } }
}

/// Which authors the walkers may step onto.
/// Validation after the walk is always the strict two-party check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Admission {
    /// Only the seed's support account and the original author.
    #[default]
    Counterpart,
    /// Also any other support account.
    AnySupport,
}

/// What the descendant walk does with a reply from a non-participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ThirdPartyReplies {
    /// Skip the reply and everything below it.
    #[default]
    Prune,
    /// Skip the reply itself but keep walking its replies.
    Traverse,
    /// Stop collecting altogether.
    Truncate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DescendantOptions {
    /// Cap on the number of collected replies.
    pub max_results: Option<usize>,
    /// Depth cap below the start message; `Some(1)` keeps direct replies only.
    pub max_depth: Option<usize>,
    pub third_party: ThirdPartyReplies,
}

impl DescendantOptions {
    /// First `k` direct replies from participants: the quick-preview shape.
    pub fn preview(k: usize) -> Self {
        Self { max_results: Some(k), max_depth: Some(1), third_party: ThirdPartyReplies::Prune }
    }
}

/// Everything the assembler needs to know about policy, bundled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ThreadPolicy {
    pub ancestors: AncestorPolicy,
    pub admission: Admission,
    pub descendants: DescendantOptions,
}

/// The two allowed parties of one candidate conversation.
#[derive(Clone, Copy, Debug)]
pub struct Participants<'a> {
    pub support_account: AuthorId,
    pub original_author: AuthorId,
    pub support: &'a SupportAccounts,
    pub admission: Admission,
}

impl<'a> Participants<'a> {
    /// May a walker step onto a message by `author`?
    #[inline]
    pub fn admits(&self, author: AuthorId) -> bool {
        self.is_pair(author)
            || (self.admission == Admission::AnySupport && self.support.contains(author))
    }

    /// Is `author` one of the two parties?
    #[inline]
    pub fn is_pair(&self, author: AuthorId) -> bool {
        author == self.support_account || author == self.original_author
    }
}
