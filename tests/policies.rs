#[path = "common/mod.rs"]
mod common;

use common::*;
use threadmine::{
    collect_down, walk_up, Admission, AncestorPolicy, Assembler, AuthorId, DescendantOptions, MessageId,
    Participants, ReplyIndex, SeenSet, SkipReason, ThirdPartyReplies, ThreadPolicy,
};

/// Support root, two public hops, then the seed.
fn support_rooted_chain() -> ReplyIndex {
    ReplyIndex::build(vec![
        msg(1, SUPPORT, None, 1),
        msg(2, U1, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, SUPPORT, Some(3), 4),
    ])
}

/// The support-anchored walk runs up to the support message and anchors there;
/// the participant walk anchors at the message the seed answers.
#[test]
fn first_support_mention_anchors_at_support_ancestor() {
    let index = support_rooted_chain();
    let s = support();

    let policy = ThreadPolicy { ancestors: AncestorPolicy::FirstSupportMention, ..Default::default() };
    let c = Assembler::new(&index, &s, policy).candidate(MessageId(4)).unwrap();
    assert_eq!(c.anchor, MessageId(1));
    assert_eq!(c.messages, ids(&[1, 2, 3, 4]));

    let c = Assembler::new(&index, &s, ThreadPolicy::default()).candidate(MessageId(4)).unwrap();
    assert_eq!(c.anchor, MessageId(3));
    assert_eq!(c.messages, ids(&[1, 2, 3, 4]));
}

/// The support-anchored walk passes over anyone, so a third user on the way up
/// fails the two-party check; the participant walk stops before that user.
#[test]
fn first_support_mention_through_third_party_is_rejected() {
    let index = ReplyIndex::build(vec![
        msg(1, SUPPORT, None, 1),
        msg(2, U2, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, SUPPORT, Some(3), 4),
    ]);
    let s = support();
    let mut seen = SeenSet::new();

    let strict = ThreadPolicy { ancestors: AncestorPolicy::FirstSupportMention, ..Default::default() };
    assert_eq!(Assembler::new(&index, &s, strict).assemble(MessageId(4), &mut seen), Err(SkipReason::ThirdParty));

    let c = Assembler::new(&index, &s, ThreadPolicy::default()).assemble(MessageId(4), &mut seen).unwrap();
    assert_eq!(c.messages, ids(&[3, 4]));
}

/// `max_depth` caps the number of upstream hops.
#[test]
fn participant_walk_respects_max_depth() {
    let index = support_rooted_chain();
    let s = support();
    let parties = Participants {
        support_account: AuthorId(SUPPORT),
        original_author: AuthorId(U1),
        support: &s,
        admission: Admission::Counterpart,
    };

    let up = walk_up(&index, MessageId(3), &parties, AncestorPolicy::Participants { max_depth: Some(1) });
    assert_eq!(up.ids, ids(&[2]));
    assert_eq!(up.anchor, None);

    let up = walk_up(&index, MessageId(3), &parties, AncestorPolicy::Participants { max_depth: Some(0) });
    assert!(up.ids.is_empty());

    let up = walk_up(&index, MessageId(3), &parties, AncestorPolicy::default());
    assert_eq!(up.ids, ids(&[1, 2]));
}

/// Seed 2 answers 1 and gets four follow-ups: 3 (U1), 4 (U2), 5 (U1), and 6 (U1 under 4).
/// 3 has its own reply 7 from support.
fn busy_thread() -> ReplyIndex {
    ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, U2, Some(2), 4),
        msg(5, U1, Some(2), 5),
        msg(6, U1, Some(4), 6),
        msg(7, SUPPORT, Some(3), 7),
    ])
}

fn replies_with(index: &ReplyIndex, opts: DescendantOptions) -> Vec<MessageId> {
    let s = support();
    let parties = Participants {
        support_account: AuthorId(SUPPORT),
        original_author: AuthorId(U1),
        support: &s,
        admission: Admission::Counterpart,
    };
    collect_down(index, MessageId(2), &parties, &opts)
}

/// Each third-party mode handles reply 4 (from U2) differently.
#[test]
fn third_party_reply_modes() {
    let index = busy_thread();
    let prune = DescendantOptions { third_party: ThirdPartyReplies::Prune, ..Default::default() };
    let traverse = DescendantOptions { third_party: ThirdPartyReplies::Traverse, ..Default::default() };
    let truncate = DescendantOptions { third_party: ThirdPartyReplies::Truncate, ..Default::default() };

    // BFS: level 1 is 3, 4, 5; level 2 is 7 (under 3) and 6 (under 4)
    assert_eq!(replies_with(&index, prune), ids(&[3, 5, 7]));
    assert_eq!(replies_with(&index, traverse), ids(&[3, 5, 7, 6]));
    assert_eq!(replies_with(&index, truncate), ids(&[3]));
}

/// Preview keeps the first `k` direct replies from participants.
#[test]
fn preview_takes_first_direct_replies() {
    let index = busy_thread();
    assert_eq!(replies_with(&index, DescendantOptions::preview(1)), ids(&[3]));
    assert_eq!(replies_with(&index, DescendantOptions::preview(5)), ids(&[3, 5]));
    assert!(replies_with(&index, DescendantOptions::preview(0)).is_empty());

    let miner = quiet_miner().descendants(DescendantOptions::preview(1));
    let (convs, _) = run_ids(&miner, &index);
    assert_eq!(convs, vec![ids(&[1, 2, 3])]);
}

/// Depth and result caps apply independently.
#[test]
fn descendant_caps() {
    let index = busy_thread();
    let depth1 = DescendantOptions { max_depth: Some(1), ..Default::default() };
    assert_eq!(replies_with(&index, depth1), ids(&[3, 5]));

    let two = DescendantOptions { max_results: Some(2), ..Default::default() };
    assert_eq!(replies_with(&index, two), ids(&[3, 5]));

    let three = DescendantOptions { max_results: Some(3), ..Default::default() };
    assert_eq!(replies_with(&index, three), ids(&[3, 5, 7]));
}

/// Letting walkers step onto other support accounts does not relax the final
/// two-party check.
#[test]
fn any_support_admission_still_validates_two_parties() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, OTHER_SUPPORT, Some(2), 3),
    ]);

    let (convs, _) = run_ids(&quiet_miner(), &index);
    assert_eq!(convs, vec![ids(&[1, 2])]);

    let (convs, report) = run_ids(&quiet_miner().admission(Admission::AnySupport), &index);
    assert!(convs.is_empty());
    assert_eq!(report.skipped(SkipReason::ThirdParty), 1);
}
