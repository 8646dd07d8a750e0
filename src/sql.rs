//! SQLite-backed message store and conversation sink.
//!
//! Layout: `tweet` rows keyed by id with `in_reply_to_status_id` as the parent
//! pointer, a `user` table for screen names, and `conversation` /
//! `conversation_tweet` for mined output.

use crate::date::{format_millis_sql, parse_timestamp_ms};
use crate::model::{AuthorId, Message, MessageId};
use crate::sink::{ConversationSink, EmittedConversation};
use crate::store::{MessageStore, ScanStats};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS \"user\" (
        id INTEGER PRIMARY KEY,
        screen_name TEXT
    );
    CREATE TABLE IF NOT EXISTS tweet (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        in_reply_to_status_id INTEGER,
        created_at TEXT,
        text TEXT,
        language TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_tweet_reply ON tweet(in_reply_to_status_id);
    CREATE INDEX IF NOT EXISTS idx_tweet_user ON tweet(user_id);
    CREATE TABLE IF NOT EXISTS conversation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        airline_id INTEGER NOT NULL,
        root_tweet_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS conversation_tweet (
        conversation_id INTEGER NOT NULL REFERENCES conversation(id),
        tweet_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (conversation_id, tweet_id)
    );
";

const MESSAGE_COLUMNS: &str =
    "t.id, t.user_id, t.in_reply_to_status_id, t.created_at, t.text, t.language, u.screen_name";

/// Support replies, the messages they answer, one level of context above
/// those, and replies to support messages. `?1` is the support account id.
const COMPONENT_IDS: &str = "
    WITH component(id) AS (
        SELECT id FROM tweet
        WHERE user_id = ?1 AND in_reply_to_status_id IS NOT NULL

        UNION

        SELECT t.id FROM tweet t
        JOIN tweet s ON s.in_reply_to_status_id = t.id
        WHERE s.user_id = ?1

        UNION

        SELECT t.id FROM tweet t
        JOIN tweet p ON t.id = p.in_reply_to_status_id
        WHERE p.id IN (
            SELECT in_reply_to_status_id FROM tweet
            WHERE user_id = ?1 AND in_reply_to_status_id IS NOT NULL
        )

        UNION

        SELECT t.id FROM tweet t
        JOIN tweet s ON t.in_reply_to_status_id = s.id
        WHERE s.user_id = ?1
    )
";

/// A stored conversation row with its tweet ids in position order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredConversation {
    pub id: i64,
    pub user_id: AuthorId,
    pub airline_id: AuthorId,
    pub root_tweet_id: MessageId,
    pub tweet_ids: Vec<MessageId>,
}

pub struct SqlStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

#[inline]
fn sql_id(id: u64) -> i64 { id as i64 }

fn created_at_from(v: Value) -> Option<i64> {
    match v {
        Value::Integer(ms) => Some(ms),
        Value::Text(s) => parse_timestamp_ms(&s),
        _ => None,
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let id: i64 = row.get(0)?;
    let author: i64 = row.get(1)?;
    let parent: Option<i64> = row.get(2)?;
    let created_at: Value = row.get(3)?;
    Ok(Message {
        id: MessageId(id as u64),
        author: AuthorId(author as u64),
        author_name: row.get(6)?,
        parent: parent.filter(|p| *p != 0).map(|p| MessageId(p as u64)),
        created_at: created_at_from(created_at),
        text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        language: row.get(5)?,
    })
}

impl SqlStore {
    /// Open an existing database. A missing file or a missing `tweet` table is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_context(|| format!("open database {}", path.display()))?;
        conn.query_row("SELECT count(*) FROM tweet", [], |r| r.get::<_, i64>(0))
            .with_context(|| format!("{} has no readable tweet table", path.display()))?;
        Ok(Self { conn: Mutex::new(conn), path: path.to_path_buf() })
    }

    /// Open or create a database and make sure the schema exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| format!("create database {}", path.display()))?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self { conn: Mutex::new(conn), path: path.to_path_buf() })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self { conn: Mutex::new(conn), path: PathBuf::from(":memory:") })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Insert messages (and their authors' screen names) in one transaction.
    /// Existing ids are left untouched. Returns the number of new tweet rows.
    pub fn insert_messages<'m, I>(&self, messages: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'m Message>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut tweet = tx.prepare(
                "INSERT OR IGNORE INTO tweet (id, user_id, in_reply_to_status_id, created_at, text, language)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut user = tx.prepare("INSERT OR IGNORE INTO \"user\" (id, screen_name) VALUES (?1, ?2)")?;
            for m in messages {
                inserted += tweet.execute(params![
                    sql_id(m.id.0),
                    sql_id(m.author.0),
                    m.parent.map(|p| sql_id(p.0)),
                    m.created_at.and_then(format_millis_sql),
                    m.text,
                    m.language,
                ])?;
                if let Some(name) = &m.author_name {
                    user.execute(params![sql_id(m.author.0), name])?;
                }
            }
        }
        tx.commit().context("commit messages")?;
        Ok(inserted)
    }

    /// Case-insensitive screen name lookup; a leading `@` is ignored.
    pub fn resolve_screen_name(&self, name: &str) -> Result<Option<AuthorId>> {
        let name = name.trim().trim_start_matches('@');
        let conn = self.conn.lock();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM \"user\" WHERE lower(screen_name) = lower(?1) LIMIT 1",
                params![name],
                |r| r.get(0),
            )
            .optional()
            .with_context(|| format!("resolve screen name {name:?}"))?;
        Ok(id.map(|i| AuthorId(i as u64)))
    }

    /// Messages that can take part in a conversation with `support`, oldest first.
    ///
    /// Context is limited to one level above the messages support replied to,
    /// and follow-ups to replies directly under support messages.
    pub fn load_support_components(&self, support: AuthorId) -> Result<Vec<Message>> {
        let sql = format!(
            "{COMPONENT_IDS}
             SELECT {MESSAGE_COLUMNS} FROM component c
             JOIN tweet t ON t.id = c.id
             LEFT JOIN \"user\" u ON u.id = t.user_id
             ORDER BY t.created_at, t.id"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sql_id(support.0)], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("load conversation components for {support}"))?;
        tracing::info!(support = %support, messages = rows.len(), "loaded conversation components");
        Ok(rows)
    }

    pub fn insert_conversation(&self, c: &EmittedConversation) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO conversation (user_id, airline_id, root_tweet_id) VALUES (?1, ?2, ?3)",
            params![sql_id(c.original_author.0), sql_id(c.support_account.0), sql_id(c.anchor.0)],
        )?;
        let conv_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO conversation_tweet (conversation_id, tweet_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (pos, id) in c.message_ids.iter().enumerate() {
                stmt.execute(params![conv_id, sql_id(id.0), pos as i64])?;
            }
        }
        tx.commit().context("commit conversation")?;
        Ok(conv_id)
    }

    /// Delete all mined conversations.
    pub fn clear_conversations(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("DELETE FROM conversation_tweet; DELETE FROM conversation;")
            .context("clear conversations")?;
        Ok(())
    }

    pub fn conversations(&self) -> Result<Vec<StoredConversation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, user_id, airline_id, root_tweet_id FROM conversation ORDER BY id")?;
        let mut out = stmt
            .query_map([], |r| {
                Ok(StoredConversation {
                    id: r.get(0)?,
                    user_id: AuthorId(r.get::<_, i64>(1)? as u64),
                    airline_id: AuthorId(r.get::<_, i64>(2)? as u64),
                    root_tweet_id: MessageId(r.get::<_, i64>(3)? as u64),
                    tweet_ids: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut tweets = conn.prepare(
            "SELECT tweet_id FROM conversation_tweet WHERE conversation_id = ?1 ORDER BY position",
        )?;
        for c in out.iter_mut() {
            c.tweet_ids = tweets
                .query_map(params![c.id], |r| r.get::<_, i64>(0))?
                .map(|r| r.map(|id| MessageId(id as u64)))
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(out)
    }

    fn query_messages(&self, filter: &str, arg: i64) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM tweet t LEFT JOIN \"user\" u ON u.id = t.user_id WHERE {filter}"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![arg], row_to_message)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl MessageStore for SqlStore {
    fn get_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.query_messages("t.id = ?1", sql_id(id.0))?.into_iter().next())
    }

    fn get_replies_to(&self, id: MessageId) -> Result<Vec<Message>> {
        self.query_messages("t.in_reply_to_status_id = ?1 ORDER BY t.created_at, t.id", sql_id(id.0))
    }

    fn get_by_author(&self, author: AuthorId) -> Result<Vec<Message>> {
        self.query_messages("t.user_id = ?1 ORDER BY t.created_at, t.id", sql_id(author.0))
    }

    fn for_each_message(&self, on_message: &mut dyn FnMut(Message)) -> Result<ScanStats> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM tweet t LEFT JOIN \"user\" u ON u.id = t.user_id ORDER BY t.rowid"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([]).with_context(|| format!("scan {}", self.path.display()))?;
        let mut stats = ScanStats::default();
        while let Some(row) = rows.next()? {
            match row_to_message(row) {
                Ok(m) => {
                    stats.records += 1;
                    on_message(m);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable tweet row");
                    stats.malformed += 1;
                }
            }
        }
        Ok(stats)
    }
}

/// Writes each emitted conversation into the store's conversation tables.
pub struct SqlSink<'a> {
    store: &'a SqlStore,
    written: u64,
}

impl<'a> SqlSink<'a> {
    /// `truncate` clears previously mined conversations first.
    pub fn new(store: &'a SqlStore, truncate: bool) -> Result<Self> {
        if truncate {
            store.clear_conversations()?;
        }
        Ok(Self { store, written: 0 })
    }

    pub fn written(&self) -> u64 { self.written }
}

impl ConversationSink for SqlSink<'_> {
    fn emit(&mut self, c: &EmittedConversation) -> Result<()> {
        self.store.insert_conversation(c)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        tracing::info!(conversations = self.written, db = %self.store.path().display(), "stored conversations");
        Ok(())
    }
}
