#[path = "common/mod.rs"]
mod common;

use common::*;
use threadmine::{
    AuthorId, ConversationSink, MessageId, MessageStore, ReplyIndex, SqlSink, SqlStore, TeeSink, VecSink,
};

/// Two threads with KLM and one with AirFrance, with names attached.
fn seeded_store(path: &std::path::Path) -> SqlStore {
    let store = SqlStore::create(path).unwrap();
    let messages = vec![
        msg(1, U1, None, 100).author_name("alice").text("lost bag"),
        msg(2, SUPPORT, Some(1), 200).author_name("KLM").text("please DM"),
        msg(3, U1, Some(2), 300).author_name("alice").text("done"),
        msg(4, U2, Some(2), 310).author_name("bob"),
        msg(10, U2, None, 400).author_name("bob").text("delayed"),
        msg(11, OTHER_SUPPORT, Some(10), 500).author_name("AirFrance").text("sorry"),
        msg(20, U3, None, 600).author_name("carol"),
        msg(21, SUPPORT, Some(20), 700).author_name("KLM"),
    ];
    assert_eq!(store.insert_messages(&messages).unwrap(), messages.len());
    store
}

/// Messages written to the store come back unchanged, including sub-second timestamps.
#[test]
fn messages_round_trip() {
    let base = temp_base();
    let store = seeded_store(&base.join("tweets.db"));

    let m = store.get_by_id(MessageId(2)).unwrap().unwrap();
    assert_eq!(m, msg(2, SUPPORT, Some(1), 200).author_name("KLM").text("please DM"));
    assert!(store.get_by_id(MessageId(999)).unwrap().is_none());

    let replies: Vec<MessageId> = store.get_replies_to(MessageId(2)).unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(replies, ids(&[3, 4]));

    let klm: Vec<MessageId> = store.get_by_author(AuthorId(SUPPORT)).unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(klm, ids(&[2, 21]));

    let precise = threadmine::Message::new(50, U1, None).at(1_538_388_000_123);
    store.insert_messages([&precise]).unwrap();
    assert_eq!(store.get_by_id(MessageId(50)).unwrap().unwrap().created_at, Some(1_538_388_000_123));

    // re-inserting an existing id is a no-op
    assert_eq!(store.insert_messages([&precise]).unwrap(), 0);
}

/// Screen names resolve case-insensitively, with or without `@`.
#[test]
fn resolves_screen_names() {
    let base = temp_base();
    let store = seeded_store(&base.join("tweets.db"));
    assert_eq!(store.resolve_screen_name("@klm").unwrap(), Some(AuthorId(SUPPORT)));
    assert_eq!(store.resolve_screen_name("AirFrance").unwrap(), Some(AuthorId(OTHER_SUPPORT)));
    assert_eq!(store.resolve_screen_name("nobody").unwrap(), None);
}

/// Opening a database that does not exist fails instead of creating an empty one.
#[test]
fn open_requires_existing_database() {
    let base = temp_base();
    let path = base.join("missing.db");
    assert!(SqlStore::open(&path).is_err());
    assert!(!path.exists());

    drop(seeded_store(&path));
    let reopened = SqlStore::open(&path).unwrap();
    assert!(reopened.get_by_id(MessageId(1)).unwrap().is_some());
}

/// Full scan, per-account component loading and the file path all produce
/// the same conversations for shallow threads.
#[test]
fn component_query_matches_full_scan() {
    let base = temp_base();
    let store = seeded_store(&base.join("tweets.db"));
    let miner = quiet_miner();

    let full = miner.load_store(&store).unwrap();
    assert_eq!(full.scan.records, 8);
    let components = miner.load_sql_components(&store).unwrap();
    assert!(components.index.len() <= full.index.len());

    let (from_full, _) = run_ids(&miner, &full.index);
    let (from_components, _) = run_ids(&miner, &components.index);
    assert_eq!(from_full, vec![ids(&[1, 2, 3]), ids(&[10, 11]), ids(&[20, 21])]);
    assert_eq!(from_components, from_full);

    // only KLM's components
    let klm = store.load_support_components(AuthorId(SUPPORT)).unwrap();
    let klm_ids: Vec<MessageId> = klm.iter().map(|m| m.id).collect();
    assert_eq!(klm_ids, ids(&[1, 2, 3, 4, 20, 21]));
    let (klm_convs, _) = run_ids(&miner, &ReplyIndex::build(klm));
    assert_eq!(klm_convs, vec![ids(&[1, 2, 3]), ids(&[20, 21])]);
}

/// Conversations written through the SQL sink keep their order and anchor;
/// truncating on open drops earlier runs.
#[test]
fn sql_sink_stores_conversations() {
    let base = temp_base();
    let store = seeded_store(&base.join("tweets.db"));
    let miner = quiet_miner();
    let corpus = miner.load_store(&store).unwrap();

    for _ in 0..2 {
        let mut sql = SqlSink::new(&store, true).unwrap();
        let mut mem = VecSink::new();
        {
            let mut tee = TeeSink::new();
            tee.push(&mut sql);
            tee.push(&mut mem);
            miner.mine(&corpus, &mut tee as &mut dyn ConversationSink).unwrap();
        }
        assert_eq!(sql.written(), 3);
        assert_eq!(mem.conversations.len(), 3);
    }

    let stored = store.conversations().unwrap();
    assert_eq!(stored.len(), 3, "second run replaced the first");
    let first = &stored[0];
    assert_eq!(first.user_id, AuthorId(U1));
    assert_eq!(first.airline_id, AuthorId(SUPPORT));
    assert_eq!(first.root_tweet_id, MessageId(1));
    assert_eq!(first.tweet_ids, ids(&[1, 2, 3]));
    assert_eq!(stored[1].airline_id, AuthorId(OTHER_SUPPORT));
}

/// Multi-line text stored in the database still renders as one transcript
/// line per message.
#[test]
fn transcript_from_sql_flattens_newlines() {
    let base = temp_base();
    let store = SqlStore::in_memory().unwrap();
    let messages = vec![
        msg(1, U1, None, 1).author_name("alice").text("lost bag\nhelp"),
        msg(2, SUPPORT, Some(1), 2).author_name("KLM").text("  please DM\r\n"),
    ];
    store.insert_messages(&messages).unwrap();

    let out = base.join("transcript.txt");
    let miner = quiet_miner();
    let corpus = miner.load_store(&store).unwrap();
    let mut sink = threadmine::TextSink::create(&out, 64 * 1024).unwrap();
    miner.mine(&corpus, &mut sink).unwrap();

    assert_eq!(
        read_lines(&out),
        vec![
            "--- Conversation 1 Start (@KLM) ---".to_string(),
            "(Time: 1000) @alice: lost bag help".to_string(),
            "(Time: 2000) @KLM: please DM".to_string(),
            "--- Conversation End ---".to_string(),
        ]
    );
}
