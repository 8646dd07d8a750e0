use crate::model::{MessageId, SupportAccounts};
use crate::policy::{Admission, AncestorPolicy, DescendantOptions, ThreadPolicy};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How seeds are spread over workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Execution {
    /// One seed at a time, in seed order.
    #[default]
    Sequential,
    /// Candidates built in parallel, claimed in seed order. Same output as `Sequential`.
    Parallel,
    /// One worker per support account with its own seen set; shard results
    /// are then merged first-wins in seed order.
    ShardedBySupport,
    /// Parallel workers claiming against one lock-guarded seen set.
    /// Winner order between overlapping candidates is not deterministic.
    SharedSeen,
}

/// Cooperative stop flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self { Self::default() }
    pub fn stop(&self) { self.0.store(true, Ordering::SeqCst); }
    #[inline]
    pub fn is_stopped(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct MinerOptions {
    pub input_dir: PathBuf,
    pub recursive: bool,              // walk subdirectories of input_dir
    pub support: SupportAccounts,
    pub policy: ThreadPolicy,
    pub execution: Execution,
    pub seed_filter: Option<Vec<MessageId>>, // restrict seeds to these ids
    pub parallelism: Option<usize>,   // Some(N) to set rayon threads, None to use default
    pub file_concurrency: usize,      // limit number of input files parsed concurrently
    pub progress: bool,               // show progress bars
    pub progress_label: Option<String>,
    pub stop: StopHandle,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./data"),
            recursive: false,
            support: SupportAccounts::new(),
            policy: ThreadPolicy::default(),
            execution: Execution::Sequential,
            seed_filter: None,
            parallelism: None,
            file_concurrency: 1, // large .zst windows are memory hungry
            progress: true,
            progress_label: None,
            stop: StopHandle::new(),

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl MinerOptions {
    pub fn with_input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.input_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_recursive(mut self, yes: bool) -> Self {
        self.recursive = yes;
        self
    }
    pub fn with_support(mut self, support: SupportAccounts) -> Self {
        self.support = support;
        self
    }
    pub fn with_policy(mut self, policy: ThreadPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn with_ancestors(mut self, ancestors: AncestorPolicy) -> Self {
        self.policy.ancestors = ancestors;
        self
    }
    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.policy.admission = admission;
        self
    }
    pub fn with_descendants(mut self, descendants: DescendantOptions) -> Self {
        self.policy.descendants = descendants;
        self
    }
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
    pub fn with_seed_filter<I: IntoIterator<Item = MessageId>>(mut self, seeds: I) -> Self {
        self.seed_filter = Some(seeds.into_iter().collect());
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }
}
