//! Canonical message model shared by every stage: ids, messages, support accounts.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Message (tweet) identifier. Always numeric once past ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// Posting account identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { s.trim().parse().map(MessageId) }
}

impl FromStr for AuthorId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { s.trim().parse().map(AuthorId) }
}

/// One ingested message. Immutable once it reaches the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: AuthorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// `None` marks a root message.
    #[serde(default)]
    pub parent: Option<MessageId>,
    /// Unix milliseconds. Only used for ordering seeds and finished conversations.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Message {
    /// Bare message with just the graph fields set. Handy for synthetic corpora.
    pub fn new(id: u64, author: u64, parent: Option<u64>) -> Self {
        Self {
            id: MessageId(id),
            author: AuthorId(author),
            author_name: None,
            parent: parent.map(MessageId),
            created_at: None,
            text: String::new(),
            language: None,
        }
    }

    pub fn at(mut self, created_at_ms: i64) -> Self {
        self.created_at = Some(created_at_ms);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Sort key used wherever a chronological order is needed.
    /// Messages without a timestamp sort first; ties break on id.
    #[inline]
    pub fn time_key(&self) -> (i64, u64) {
        (self.created_at.unwrap_or(i64::MIN), self.id.0)
    }
}

/// Airline accounts known to the corpus, by screen name.
const KNOWN_AIRLINES: &[(&str, u64)] = &[
    ("KLM", 56377143),
    ("AirFrance", 106062176),
    ("British_Airways", 18332190),
    ("AmericanAir", 22536055),
    ("Lufthansa", 124476322),
    ("AirBerlin", 26223583),
    ("AirBerlin_assist", 2182373406),
    ("easyJet", 38676903),
    ("RyanAir", 1542862735),
    ("SingaporeAir", 253340062),
    ("Qantas", 218730857),
    ("EtihadAirways", 45621423),
    ("VirginAtlantic", 20626359),
];

/// The fixed set of "business side" accounts for a batch.
#[derive(Clone, Debug, Default)]
pub struct SupportAccounts {
    ids: AHashSet<AuthorId>,
    // lowercase screen name -> id
    names: BTreeMap<String, AuthorId>,
}

impl SupportAccounts {
    pub fn new() -> Self { Self::default() }

    pub fn from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        let mut s = Self::new();
        for id in ids { s.insert(AuthorId(id)); }
        s
    }

    /// Registry of every airline account the corpus was collected for.
    pub fn known_airlines() -> Self {
        let mut s = Self::new();
        for (name, id) in KNOWN_AIRLINES {
            s.insert_named(name, AuthorId(*id));
        }
        s
    }

    pub fn insert(&mut self, id: AuthorId) { self.ids.insert(id); }

    pub fn insert_named(&mut self, name: &str, id: AuthorId) {
        self.ids.insert(id);
        self.names.insert(name.trim().trim_start_matches('@').to_lowercase(), id);
    }

    #[inline]
    pub fn contains(&self, id: AuthorId) -> bool { self.ids.contains(&id) }

    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<AuthorId> {
        let mut v: Vec<AuthorId> = self.ids.iter().copied().collect();
        v.sort();
        v
    }

    /// Resolve `@name`, `name` (case-insensitive) or a numeric id.
    pub fn lookup(&self, name_or_id: &str) -> Option<AuthorId> {
        let key = name_or_id.trim().trim_start_matches('@');
        if let Ok(id) = key.parse::<AuthorId>() {
            return Some(id);
        }
        self.names.get(&key.to_lowercase()).copied()
    }

    pub fn name_of(&self, id: AuthorId) -> Option<&str> {
        self.names.iter().find(|(_, v)| **v == id).map(|(k, _)| k.as_str())
    }

    /// Narrow this registry down to the requested accounts.
    /// Unknown names are returned in the error list.
    pub fn select<I, S>(&self, wanted: I) -> (SupportAccounts, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = SupportAccounts::new();
        let mut unknown = Vec::new();
        for w in wanted {
            let w = w.as_ref();
            match self.lookup(w) {
                Some(id) => match self.name_of(id) {
                    Some(name) => { let name = name.to_string(); out.insert_named(&name, id); }
                    None => out.insert(id),
                },
                None => unknown.push(w.to_string()),
            }
        }
        (out, unknown)
    }
}
