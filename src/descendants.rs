//! Downward breadth-first collection over the reply tree.

use crate::index::ReplyIndex;
use crate::model::MessageId;
use crate::policy::{DescendantOptions, Participants, ThirdPartyReplies};
use ahash::AHashSet;
use std::collections::VecDeque;

/// Collect replies below `start` (exclusive) in BFS order.
///
/// The reply graph is treated as a general graph: every id is visited at most
/// once even if several parents point at it or pointers form a cycle.
pub fn collect_down(
    index: &ReplyIndex,
    start: MessageId,
    parties: &Participants<'_>,
    opts: &DescendantOptions,
) -> Vec<MessageId> {
    let mut out = Vec::new();
    if opts.max_results == Some(0) {
        return out;
    }

    let mut visited: AHashSet<MessageId> = AHashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<(MessageId, usize)> = VecDeque::new();
    queue.push_back((start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if opts.max_depth.is_some_and(|d| depth >= d) {
            continue;
        }
        for &reply_id in index.replies_to(current) {
            if !visited.insert(reply_id) {
                continue;
            }
            let Some(reply) = index.get(reply_id) else { continue };

            if !parties.admits(reply.author) {
                match opts.third_party {
                    ThirdPartyReplies::Prune => continue,
                    ThirdPartyReplies::Traverse => {
                        queue.push_back((reply_id, depth + 1));
                        continue;
                    }
                    ThirdPartyReplies::Truncate => return out,
                }
            }

            out.push(reply_id);
            if opts.max_results.is_some_and(|cap| out.len() >= cap) {
                return out;
            }
            queue.push_back((reply_id, depth + 1));
        }
    }
    out
}
