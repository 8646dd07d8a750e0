mod config;
mod date;
mod model;
mod paths;
mod tweet;
mod jsonl;

mod progress;
mod concurrency;
mod util;
mod mem;
mod output;

mod store;
mod sql;
mod index;
mod policy;
mod ancestors;
mod descendants;
mod seen;
mod assemble;
mod sink;
mod pipeline;

pub use crate::config::{Execution, MinerOptions, StopHandle};
pub use crate::model::{AuthorId, Message, MessageId, SupportAccounts};
pub use crate::pipeline::{BatchReport, LoadedCorpus, ThreadMiner};

// graph building and walking
pub use crate::index::{IndexStats, ReplyIndex};
pub use crate::ancestors::{walk_up, Ancestry};
pub use crate::descendants::collect_down;
pub use crate::policy::{Admission, AncestorPolicy, DescendantOptions, Participants, ThirdPartyReplies, ThreadPolicy};
pub use crate::assemble::{claim, Assembler, Conversation, SkipReason};
pub use crate::seen::{SeenIds, SeenSet, SharedSeenSet};

// stores and sinks
pub use crate::store::{JsonlStore, MemoryStore, MessageStore, ScanStats};
pub use crate::sql::{SqlSink, SqlStore, StoredConversation};
pub use crate::sink::{ConversationSink, EmittedConversation, NdjsonSink, TeeSink, TextSink, VecSink};

// input parsing
pub use crate::paths::{discover_inputs, FileKind, InputFile};
pub use crate::tweet::{parse_message, Rejected};
pub use crate::date::{format_millis_rfc3339, format_millis_sql, parse_timestamp_ms};

// Expose multiprogress and progress helpers.
pub use crate::progress::{set_global_multiprogress, ProgressScope};

// Expose memory helpers for adaptive throttling from the binary.
pub use crate::mem::{available_memory_fraction, is_low_memory};

pub use crate::util::{init_tracing_once, merge_support_from_env};
