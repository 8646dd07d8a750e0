//! Raw record parsing: full Twitter payloads and cleaned flat rows both land here
//! and leave as canonical [`Message`]s. This is the only place ids are converted.

use crate::date::parse_timestamp_ms;
use crate::model::{AuthorId, Message, MessageId};
use serde::Deserialize;

/// Ids show up as JSON numbers in some exports and as strings in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Num(u64),
    Str(String),
}

impl IdRepr {
    fn to_u64(&self) -> Option<u64> {
        match self {
            IdRepr::Num(n) => Some(*n),
            IdRepr::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<IdRepr>,
    id_str: Option<String>,
    screen_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExtended {
    full_text: Option<String>,
}

/// Minimal line-level schema. Unknown fields are ignored by serde.
/// Covers the streaming API shape (`user`, `*_str` ids, `extended_tweet`) and the
/// cleaned row shape (`user_id`, `language`, SQL datetimes).
#[derive(Debug, Deserialize)]
struct RawTweet {
    id: Option<IdRepr>,
    id_str: Option<String>,

    user: Option<RawUser>,
    user_id: Option<IdRepr>,
    screen_name: Option<String>,

    in_reply_to_status_id: Option<IdRepr>,
    in_reply_to_status_id_str: Option<String>,

    created_at: Option<IdRepr>,
    timestamp_ms: Option<IdRepr>,

    text: Option<String>,
    full_text: Option<String>,
    extended_tweet: Option<RawExtended>,

    lang: Option<String>,
    language: Option<String>,
}

/// Why a line did not become a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejected {
    /// Not JSON, or not an object.
    Unparseable,
    /// No usable message id (e.g. stream `delete` notices).
    MissingId,
    /// No usable author id.
    MissingAuthor,
}

/// Prefer the exact `*_str` form; fall back to the numeric one.
fn pick_id(s: Option<&str>, n: Option<&IdRepr>) -> Option<u64> {
    s.and_then(|s| s.trim().parse().ok()).or_else(|| n.and_then(IdRepr::to_u64))
}

pub(crate) fn clean_text(s: &str) -> String {
    s.replace(['\n', '\r'], " ").trim().to_string()
}

impl RawTweet {
    fn into_message(self) -> Result<Message, Rejected> {
        let id = pick_id(self.id_str.as_deref(), self.id.as_ref()).ok_or(Rejected::MissingId)?;

        let (user_id, user_name) = match &self.user {
            Some(u) => (pick_id(u.id_str.as_deref(), u.id.as_ref()), u.screen_name.clone()),
            None => (None, None),
        };
        let author = user_id
            .or_else(|| self.user_id.as_ref().and_then(IdRepr::to_u64))
            .ok_or(Rejected::MissingAuthor)?;

        // 0 is what some exports write for "no parent".
        let parent = pick_id(self.in_reply_to_status_id_str.as_deref(), self.in_reply_to_status_id.as_ref())
            .filter(|p| *p != 0);

        let created_at = self
            .timestamp_ms
            .as_ref()
            .and_then(|t| match t {
                IdRepr::Num(n) => i64::try_from(*n).ok(),
                IdRepr::Str(s) => parse_timestamp_ms(s),
            })
            .or_else(|| {
                self.created_at.as_ref().and_then(|t| match t {
                    IdRepr::Num(n) => i64::try_from(*n).ok(),
                    IdRepr::Str(s) => parse_timestamp_ms(s),
                })
            });

        let text = self
            .extended_tweet
            .and_then(|e| e.full_text)
            .or(self.full_text)
            .or(self.text)
            .map(|t| clean_text(&t))
            .unwrap_or_default();

        Ok(Message {
            id: MessageId(id),
            author: AuthorId(author),
            author_name: user_name.or(self.screen_name),
            parent: parent.map(MessageId),
            created_at,
            text,
            language: self.lang.or(self.language),
        })
    }
}

/// Parse one JSON line into a [`Message`].
pub fn parse_message(line: &str) -> Result<Message, Rejected> {
    let raw: RawTweet = serde_json::from_str(line).map_err(|_| Rejected::Unparseable)?;
    raw.into_message()
}
