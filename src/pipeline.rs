use crate::assemble::{claim, Assembler, Conversation, SkipReason};
use crate::config::{Execution, MinerOptions, StopHandle};
use crate::index::{IndexStats, ReplyIndex};
use crate::mem::available_memory_fraction;
use crate::model::{AuthorId, MessageId, SupportAccounts};
use crate::paths::discover_inputs;
use crate::policy::{Admission, AncestorPolicy, DescendantOptions, ThreadPolicy};
use crate::progress::ProgressScope;
use crate::seen::{SeenSet, SharedSeenSet};
use crate::sink::{ConversationSink, EmittedConversation};
use crate::sql::SqlStore;
use crate::store::{JsonlStore, MessageStore, ScanStats};
use crate::util::{create_with_backoff, init_tracing_once};
use anyhow::{bail, Context, Result};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Seeds handed to the rayon pool at a time; the stop flag is honored between chunks.
const SEED_CHUNK: usize = 4096;

#[derive(Clone)]
pub struct ThreadMiner {
    pub(crate) opts: MinerOptions,
}

/// A built index plus the counters from the scan that produced it.
pub struct LoadedCorpus {
    pub index: ReplyIndex,
    pub scan: ScanStats,
}

/// End-of-batch summary. Logged when a run finishes and serializable as JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub execution: Execution,
    pub seeds_total: u64,
    pub seeds_processed: u64,
    pub emitted: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
    pub scan: ScanStats,
    pub index: IndexStats,
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn skipped(&self, reason: SkipReason) -> u64 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn skipped_total(&self) -> u64 { self.skipped.values().sum() }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let f = create_with_backoff(path, 16, 50).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n")?;
        w.flush().with_context(|| format!("flush {}", path.display()))?;
        Ok(())
    }

    fn log(&self) {
        tracing::info!(
            seeds = self.seeds_total,
            processed = self.seeds_processed,
            emitted = self.emitted,
            skipped = self.skipped_total(),
            rejected_records = self.scan.rejected(),
            duplicates = self.index.duplicates,
            stopped_early = self.stopped_early,
            "batch finished"
        );
        for (reason, n) in &self.skipped {
            tracing::info!("  skipped {:>8}  {}", n, reason);
        }
    }
}

/// Turns per-seed outcomes into sink calls and report counters.
struct Emitter<'i, 's> {
    index: &'i ReplyIndex,
    sink: &'s mut dyn ConversationSink,
    report: BatchReport,
    seq: u64,
}

impl Emitter<'_, '_> {
    fn record(&mut self, seed: MessageId, outcome: Result<Conversation, SkipReason>) -> Result<()> {
        self.report.seeds_processed += 1;
        match outcome {
            Ok(c) => {
                self.seq += 1;
                let emitted = EmittedConversation::new(self.seq, &c, self.index);
                self.sink.emit(&emitted).with_context(|| format!("emit conversation for seed {seed}"))?;
                self.report.emitted += 1;
            }
            Err(reason) => {
                tracing::debug!(seed = %seed, %reason, "seed skipped");
                *self.report.skipped.entry(reason).or_default() += 1;
            }
        }
        Ok(())
    }
}

impl Default for ThreadMiner {
    fn default() -> Self { Self::new() }
}

impl ThreadMiner {
    pub fn new() -> Self {
        Self { opts: MinerOptions::default() }
    }

    pub fn from_options(opts: MinerOptions) -> Self { Self { opts } }

    pub fn options(&self) -> &MinerOptions { &self.opts }

    // -------- Builder methods --------
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input_dir(dir); self }
    pub fn recursive(mut self, yes: bool) -> Self { self.opts = self.opts.with_recursive(yes); self }
    pub fn support(mut self, support: SupportAccounts) -> Self { self.opts = self.opts.with_support(support); self }
    pub fn policy(mut self, policy: ThreadPolicy) -> Self { self.opts = self.opts.with_policy(policy); self }
    pub fn ancestors(mut self, ancestors: AncestorPolicy) -> Self { self.opts = self.opts.with_ancestors(ancestors); self }
    pub fn admission(mut self, admission: Admission) -> Self { self.opts = self.opts.with_admission(admission); self }
    pub fn descendants(mut self, d: DescendantOptions) -> Self { self.opts = self.opts.with_descendants(d); self }
    pub fn execution(mut self, execution: Execution) -> Self { self.opts = self.opts.with_execution(execution); self }
    pub fn seeds<I: IntoIterator<Item = MessageId>>(mut self, seeds: I) -> Self { self.opts = self.opts.with_seed_filter(seeds); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn stop_handle(mut self, stop: StopHandle) -> Self { self.opts = self.opts.with_stop_handle(stop); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }

    fn apply_parallelism(&self) {
        if let Some(n) = self.opts.parallelism {
            if n > 0 { rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok(); }
        }
    }

    // -------- Loading --------

    /// Discover input files under `input_dir` and index them in one scan.
    pub fn load_files(&self) -> Result<LoadedCorpus> {
        init_tracing_once();
        self.apply_parallelism();
        let dir = &self.opts.input_dir;
        if !dir.is_dir() {
            bail!("input directory {} does not exist", dir.display());
        }
        let files = discover_inputs(dir, self.opts.recursive);
        if files.is_empty() {
            tracing::warn!("No input files found under {}.", dir.display());
        } else {
            tracing::info!("Planned {} files for indexing.", files.len());
        }
        let store = JsonlStore::new(files)
            .read_buffer(self.opts.read_buffer_bytes)
            .file_concurrency(self.opts.file_concurrency)
            .progress(self.opts.progress);
        self.load_store(&store)
    }

    /// Index every message of `store`.
    pub fn load_store(&self, store: &dyn MessageStore) -> Result<LoadedCorpus> {
        init_tracing_once();
        let (index, scan) = ReplyIndex::from_store(store)?;
        let stats = index.stats();
        tracing::info!(
            messages = stats.messages,
            duplicates = stats.duplicates,
            orphans = stats.orphans,
            rejected = scan.rejected(),
            mem_available = format!("{:.0}%", available_memory_fraction() * 100.0),
            "index built"
        );
        Ok(LoadedCorpus { index, scan })
    }

    /// Index only the conversation components of the configured support
    /// accounts instead of the whole `tweet` table.
    pub fn load_sql_components(&self, store: &SqlStore) -> Result<LoadedCorpus> {
        init_tracing_once();
        let mut scan = ScanStats::default();
        let mut messages = Vec::new();
        for support in self.opts.support.ids() {
            let part = store.load_support_components(support)?;
            scan.records += part.len() as u64;
            messages.extend(part);
        }
        let index = ReplyIndex::build(messages);
        tracing::info!(messages = index.len(), accounts = self.opts.support.len(), "component index built");
        Ok(LoadedCorpus { index, scan })
    }

    // -------- Mining --------

    /// Seeds in processing order: every support-authored reply, or the
    /// explicit seed filter, oldest first.
    pub fn seed_order(&self, index: &ReplyIndex) -> Vec<MessageId> {
        match &self.opts.seed_filter {
            None => index.seeds(&self.opts.support),
            Some(wanted) => {
                let mut uniq: AHashSet<MessageId> = AHashSet::new();
                let mut v: Vec<MessageId> = wanted.iter().copied().filter(|id| uniq.insert(*id)).collect();
                v.sort_by_key(|id| index.get(*id).map(|m| m.time_key()).unwrap_or((i64::MIN, id.0)));
                v
            }
        }
    }

    /// `run` plus the scan counters of the corpus in the report.
    pub fn mine(&self, corpus: &LoadedCorpus, sink: &mut dyn ConversationSink) -> Result<BatchReport> {
        let report = self.run_inner(&corpus.index, sink, corpus.scan)?;
        report.log();
        Ok(report)
    }

    /// Assemble conversations for every seed and hand them to `sink` in seed order.
    pub fn run(&self, index: &ReplyIndex, sink: &mut dyn ConversationSink) -> Result<BatchReport> {
        let report = self.run_inner(index, sink, ScanStats::default())?;
        report.log();
        Ok(report)
    }

    fn run_inner(&self, index: &ReplyIndex, sink: &mut dyn ConversationSink, scan: ScanStats) -> Result<BatchReport> {
        init_tracing_once();
        self.apply_parallelism();
        if self.opts.support.is_empty() {
            bail!("no support accounts configured");
        }

        let seeds = self.seed_order(index);
        let assembler = Assembler::new(index, &self.opts.support, self.opts.policy);
        let label = self.opts.progress_label.clone().unwrap_or_else(|| "Mining conversations".to_string());
        let pb = ProgressScope::count(self.opts.progress, label, seeds.len() as u64);
        tracing::info!(seeds = seeds.len(), execution = ?self.opts.execution, "processing seeds");

        let mut em = Emitter {
            index,
            sink,
            report: BatchReport {
                execution: self.opts.execution,
                seeds_total: seeds.len() as u64,
                scan,
                index: index.stats(),
                ..Default::default()
            },
            seq: 0,
        };

        let stopped = match self.opts.execution {
            Execution::Sequential => self.run_sequential(&assembler, &seeds, &mut em, &pb)?,
            Execution::Parallel => self.run_parallel(&assembler, &seeds, &mut em, &pb)?,
            Execution::ShardedBySupport => self.run_sharded(&assembler, &seeds, &mut em, &pb)?,
            Execution::SharedSeen => self.run_shared(&assembler, &seeds, &mut em, &pb)?,
        };
        if stopped {
            tracing::warn!("stop requested; flushing partial results");
        }

        em.sink.finish().context("finish sink")?;
        pb.finish(format!("{} conversations", em.report.emitted));
        em.report.stopped_early = stopped;
        Ok(em.report)
    }

    fn run_sequential(&self, a: &Assembler<'_>, seeds: &[MessageId], em: &mut Emitter<'_, '_>, pb: &ProgressScope) -> Result<bool> {
        let stop = &self.opts.stop;
        let mut seen = SeenSet::new();
        for &seed in seeds {
            if stop.is_stopped() { return Ok(true); }
            em.record(seed, a.assemble(seed, &mut seen))?;
            pb.inc(1);
        }
        Ok(false)
    }

    /// Candidates in parallel, claims in seed order.
    fn run_parallel(&self, a: &Assembler<'_>, seeds: &[MessageId], em: &mut Emitter<'_, '_>, pb: &ProgressScope) -> Result<bool> {
        let stop = &self.opts.stop;
        let mut seen = SeenSet::new();
        for chunk in seeds.chunks(SEED_CHUNK) {
            let candidates: Vec<Option<Result<Conversation, SkipReason>>> = chunk
                .par_iter()
                .map(|&seed| (!stop.is_stopped()).then(|| a.candidate(seed)))
                .collect();
            for (&seed, cand) in chunk.iter().zip(candidates) {
                let Some(cand) = cand.filter(|_| !stop.is_stopped()) else { return Ok(true) };
                em.record(seed, cand.and_then(|c| claim(c, &mut seen)))?;
                pb.inc(1);
            }
        }
        Ok(false)
    }

    /// One seen set per support account, then a cross-shard first-wins pass in seed order.
    fn run_sharded(&self, a: &Assembler<'_>, seeds: &[MessageId], em: &mut Emitter<'_, '_>, pb: &ProgressScope) -> Result<bool> {
        let stop = &self.opts.stop;
        let mut shards: BTreeMap<AuthorId, Vec<MessageId>> = BTreeMap::new();
        for &seed in seeds {
            // unknown seeds have no author; they land in a shard of their own
            let key = a.index().author_of(seed).unwrap_or(AuthorId(0));
            shards.entry(key).or_default().push(seed);
        }
        tracing::debug!(shards = shards.len(), "sharded by support account");

        let outcomes: Vec<Vec<(MessageId, Result<Conversation, SkipReason>)>> = shards
            .par_iter()
            .map(|(_, shard_seeds)| {
                let mut seen = SeenSet::new();
                let mut out = Vec::with_capacity(shard_seeds.len());
                for &seed in shard_seeds {
                    if stop.is_stopped() { break; }
                    out.push((seed, a.assemble(seed, &mut seen)));
                    pb.inc(1);
                }
                out
            })
            .collect();

        let mut by_seed: AHashMap<MessageId, Result<Conversation, SkipReason>> =
            outcomes.into_iter().flatten().collect();
        let mut seen = SeenSet::new();
        // everything the shards finished is merged, even after a stop
        for &seed in seeds {
            let Some(outcome) = by_seed.remove(&seed) else { continue };
            em.record(seed, outcome.and_then(|c| claim(c, &mut seen)))?;
        }
        Ok(stop.is_stopped())
    }

    /// Parallel assembly against one shared seen set.
    fn run_shared(&self, a: &Assembler<'_>, seeds: &[MessageId], em: &mut Emitter<'_, '_>, pb: &ProgressScope) -> Result<bool> {
        let stop = &self.opts.stop;
        let shared = SharedSeenSet::new();
        for chunk in seeds.chunks(SEED_CHUNK) {
            let outcomes: Vec<Option<Result<Conversation, SkipReason>>> = chunk
                .par_iter()
                .map(|&seed| {
                    if stop.is_stopped() { return None; }
                    let mut gate = &shared;
                    let out = a.assemble(seed, &mut gate);
                    pb.inc(1);
                    Some(out)
                })
                .collect();
            // claims already made in this chunk are emitted even after a stop
            let mut stopped = false;
            for (&seed, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Some(outcome) => em.record(seed, outcome)?,
                    None => stopped = true,
                }
            }
            if stopped { return Ok(true); }
        }
        Ok(false)
    }
}
