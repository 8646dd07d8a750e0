//! Upward walk along parent pointers.

use crate::index::ReplyIndex;
use crate::model::MessageId;
use crate::policy::{AncestorPolicy, Participants};
use ahash::AHashSet;

/// Result of an upward walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ancestry {
    /// Ancestors of the start message, oldest first. Never includes the start.
    pub ids: Vec<MessageId>,
    /// Support-authored ancestor that ended a `FirstSupportMention` walk.
    pub anchor: Option<MessageId>,
}

/// Walk up from `start` (exclusive). An unresolved parent, a repeated id, or
/// the policy's stop condition ends the walk; what was gathered so far is returned.
pub fn walk_up(
    index: &ReplyIndex,
    start: MessageId,
    parties: &Participants<'_>,
    policy: AncestorPolicy,
) -> Ancestry {
    let mut out = Ancestry::default();
    let mut visited: AHashSet<MessageId> = AHashSet::new();
    visited.insert(start);

    let mut cursor = index.get(start).and_then(|m| m.parent);
    while let Some(pid) = cursor {
        if !visited.insert(pid) {
            break; // cycle
        }
        let Some(parent) = index.get(pid) else { break };

        match policy {
            AncestorPolicy::Participants { max_depth } => {
                if max_depth.is_some_and(|d| out.ids.len() >= d) {
                    break;
                }
                if !parties.admits(parent.author) {
                    break;
                }
                out.ids.push(pid);
            }
            AncestorPolicy::FirstSupportMention => {
                out.ids.push(pid);
                if parties.support.contains(parent.author) {
                    out.anchor = Some(pid);
                    break;
                }
            }
        }
        cursor = parent.parent;
    }

    out.ids.reverse();
    out
}
