//! Seen-id sets: which message ids already belong to an emitted conversation.

use crate::model::MessageId;
use ahash::AHashSet;
use parking_lot::Mutex;

/// Claim bookkeeping for the no-overlap rule.
pub trait SeenIds {
    fn is_claimed(&self, id: MessageId) -> bool;
    /// Claim every id in `ids`, or none of them if any is already claimed.
    /// Returns whether the claim happened.
    fn try_claim(&mut self, ids: &[MessageId]) -> bool;
}

/// Owned seen-id set for one worker (or the whole batch when sequential).
#[derive(Clone, Debug, Default)]
pub struct SeenSet {
    ids: AHashSet<MessageId>,
}

impl SeenSet {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

impl SeenIds for SeenSet {
    #[inline]
    fn is_claimed(&self, id: MessageId) -> bool { self.ids.contains(&id) }

    fn try_claim(&mut self, ids: &[MessageId]) -> bool {
        if ids.iter().any(|id| self.ids.contains(id)) {
            return false;
        }
        self.ids.extend(ids.iter().copied());
        true
    }
}

/// One seen-id set shared by concurrent workers.
/// Membership check and registration happen under the same lock.
#[derive(Debug, Default)]
pub struct SharedSeenSet {
    inner: Mutex<SeenSet>,
}

impl SharedSeenSet {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.inner.lock().len() }
    pub fn is_empty(&self) -> bool { self.inner.lock().is_empty() }
}

impl SeenIds for &SharedSeenSet {
    fn is_claimed(&self, id: MessageId) -> bool { self.inner.lock().is_claimed(id) }

    fn try_claim(&mut self, ids: &[MessageId]) -> bool {
        self.inner.lock().try_claim(ids)
    }
}
