#[path = "common/mod.rs"]
mod common;

use common::*;
use std::collections::BTreeSet;
use threadmine::{
    Assembler, AuthorId, MessageId, ReplyIndex, SeenSet, SkipReason, ThreadPolicy, VecSink,
};

/// A user tweet and a support reply to it form the smallest conversation:
/// both ids, in chronological order, with exactly the two authors.
#[test]
fn single_support_reply_forms_a_conversation() {
    let index = ReplyIndex::build(vec![msg(1, U1, None, 1), msg(2, SUPPORT, Some(1), 2)]);
    let (convs, report) = run_ids(&quiet_miner(), &index);

    assert_eq!(convs, vec![ids(&[1, 2])]);
    assert_eq!(report.emitted, 1);
    assert_eq!(report.seeds_total, 1);

    let s = support();
    let c = Assembler::new(&index, &s, ThreadPolicy::default())
        .assemble(MessageId(2), &mut SeenSet::new())
        .unwrap();
    let authors: BTreeSet<AuthorId> = c.authors(&index);
    assert_eq!(authors, BTreeSet::from([AuthorId(U1), AuthorId(SUPPORT)]));
    assert_eq!(c.original_author, AuthorId(U1));
    assert_eq!(c.support_account, AuthorId(SUPPORT));
    assert_eq!(c.anchor, MessageId(1), "anchor is the message the seed answers");
}

/// A follow-up from the original author is kept; a reply from a third user is
/// dropped along with everything under it.
#[test]
fn follow_up_kept_and_third_party_reply_pruned() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, U2, Some(2), 4),
        msg(5, U1, Some(4), 5),
    ]);
    let (convs, report) = run_ids(&quiet_miner(), &index);
    assert_eq!(convs, vec![ids(&[1, 2, 3])]);
    assert_eq!(report.skipped_total(), 0);
}

/// When a later seed is already part of an earlier conversation, only the
/// earlier conversation is emitted.
#[test]
fn seed_inside_earlier_conversation_is_already_claimed() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, SUPPORT, Some(3), 4),
    ]);
    let (convs, report) = run_ids(&quiet_miner(), &index);
    assert_eq!(convs, vec![ids(&[1, 2, 3, 4])]);
    assert_eq!(report.seeds_total, 2);
    assert_eq!(report.skipped(SkipReason::AlreadyClaimed), 1);
}

/// Two support replies to the same user tweet: the second candidate shares the
/// user tweet with the first and is dropped whole.
#[test]
fn sibling_support_replies_overlap_first_wins() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, SUPPORT, Some(1), 3),
    ]);
    let (convs, report) = run_ids(&quiet_miner(), &index);
    assert_eq!(convs, vec![ids(&[1, 2])]);
    assert_eq!(report.skipped(SkipReason::Overlap), 1);
}

/// Seeds that cannot start a conversation are counted by reason, not errors.
#[test]
fn seed_boundaries_are_reported_as_skips() {
    let index = ReplyIndex::build(vec![
        msg(1, SUPPORT, None, 1),              // support root
        msg(2, SUPPORT, Some(999), 2),         // parent outside the batch
        msg(3, OTHER_SUPPORT, None, 3),
        msg(4, SUPPORT, Some(3), 4),           // support talking to support
        msg(5, U1, None, 5),
    ]);
    let s = support();
    let a = Assembler::new(&index, &s, ThreadPolicy::default());
    let mut seen = SeenSet::new();

    assert_eq!(a.assemble(MessageId(1), &mut seen), Err(SkipReason::NoParent));
    assert_eq!(a.assemble(MessageId(2), &mut seen), Err(SkipReason::ParentMissing));
    assert_eq!(a.assemble(MessageId(4), &mut seen), Err(SkipReason::NoCounterpart));
    assert_eq!(a.assemble(MessageId(5), &mut seen), Err(SkipReason::NotSupport));
    assert_eq!(a.assemble(MessageId(77), &mut seen), Err(SkipReason::UnknownSeed));
    assert!(seen.is_empty(), "skipped seeds must not claim anything");

    let (convs, report) = run_ids(&quiet_miner(), &index);
    assert!(convs.is_empty());
    // seed discovery only yields support replies: 2 and 4
    assert_eq!(report.seeds_total, 2);
    assert_eq!(report.skipped(SkipReason::ParentMissing), 1);
    assert_eq!(report.skipped(SkipReason::NoCounterpart), 1);
}

/// An explicit seed list is honored as given, including seeds that are not replies.
#[test]
fn explicit_seed_filter_reports_every_requested_seed() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, SUPPORT, None, 3),
        msg(10, U2, None, 10),
        msg(11, SUPPORT, Some(10), 11),
    ]);
    let miner = quiet_miner().seeds(ids(&[11, 3, 42, 11]));
    let (convs, report) = run_ids(&miner, &index);

    assert_eq!(convs, vec![ids(&[10, 11])], "seed 2 was not requested");
    assert_eq!(report.seeds_total, 3, "duplicates in the filter collapse");
    assert_eq!(report.skipped(SkipReason::NoParent), 1);
    assert_eq!(report.skipped(SkipReason::UnknownSeed), 1);
}

/// Upstream context by the same two parties is prepended, oldest first.
#[test]
fn upstream_context_is_collected_oldest_first() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 1),
        msg(2, SUPPORT, Some(1), 2),
        msg(3, U1, Some(2), 3),
        msg(4, SUPPORT, Some(3), 4),
    ]);
    let miner = quiet_miner().seeds(ids(&[4]));
    let (convs, _) = run_ids(&miner, &index);
    assert_eq!(convs, vec![ids(&[1, 2, 3, 4])]);
}

/// Emitted conversations carry their message records in chronological order,
/// even when a reply has an earlier timestamp than the message it answers.
#[test]
fn emitted_messages_follow_timestamps() {
    let index = ReplyIndex::build(vec![
        msg(1, U1, None, 10),
        msg(2, SUPPORT, Some(1), 20),
        msg(3, U1, Some(2), 15),
    ]);
    let mut sink = VecSink::new();
    let report = quiet_miner().run(&index, &mut sink).unwrap();
    assert_eq!(report.emitted, 1);

    let c = &sink.conversations[0];
    assert_eq!(c.seq, 1);
    assert_eq!(c.message_ids, ids(&[1, 3, 2]));
    let times: Vec<i64> = c.messages.iter().map(|m| m.created_at.unwrap()).collect();
    assert_eq!(times, vec![10_000, 15_000, 20_000]);
}
