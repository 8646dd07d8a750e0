use anyhow::{bail, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use threadmine::{
    init_tracing_once, merge_support_from_env, Admission, AncestorPolicy, ConversationSink, DescendantOptions,
    Execution, MessageId, NdjsonSink, SqlSink, SqlStore, SupportAccounts, TeeSink, TextSink, ThirdPartyReplies,
    ThreadMiner,
};

#[derive(Parser)]
#[command(name = "threadmine", about = "Reconstruct support conversations from reply-linked tweets")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "db"])))]
struct Cli {
    /// Directory of .json/.jsonl/.ndjson/.zst tweet files
    #[arg(long)]
    input: Option<PathBuf>,

    /// Existing SQLite database with a `tweet` table
    #[arg(long)]
    db: Option<PathBuf>,

    /// Support account by screen name or numeric id (repeatable)
    #[arg(long, required = true)]
    support: Vec<String>,

    /// Only process these seed message ids (repeatable)
    #[arg(long)]
    seed: Vec<MessageId>,

    #[arg(long, value_enum, default_value = "participants")]
    ancestors: AncestorsArg,

    /// Cap on upstream context messages (participants policy only)
    #[arg(long)]
    max_ancestors: Option<usize>,

    /// Cap on collected replies below the seed
    #[arg(long)]
    max_replies: Option<usize>,

    /// Depth cap below the seed; 1 keeps direct replies only
    #[arg(long)]
    reply_depth: Option<usize>,

    #[arg(long, value_enum, default_value = "prune")]
    third_party: ThirdPartyArg,

    #[arg(long, value_enum, default_value = "counterpart")]
    admission: AdmissionArg,

    #[arg(long, value_enum, default_value = "sequential")]
    execution: ExecutionArg,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Output file (default: stdout unless --store-conversations is given)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "ndjson")]
    format: FormatArg,

    /// Write conversations into the database given by --db
    #[arg(long, requires = "db")]
    store_conversations: bool,

    /// Index the whole tweet table instead of per-account conversation components
    #[arg(long, requires = "db")]
    full_scan: bool,

    /// Write the batch report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Walk subdirectories of --input
    #[arg(long)]
    recursive: bool,

    /// Concurrent input files while indexing
    #[arg(long, default_value_t = 1)]
    file_concurrency: usize,

    #[arg(long)]
    no_progress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum AncestorsArg { Participants, FirstSupport }

#[derive(Clone, Copy, ValueEnum)]
enum ThirdPartyArg { Prune, Traverse, Truncate }

#[derive(Clone, Copy, ValueEnum)]
enum AdmissionArg { Counterpart, AnySupport }

#[derive(Clone, Copy, ValueEnum)]
enum ExecutionArg { Sequential, Parallel, Sharded, Shared }

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg { Ndjson, Text }

fn resolve_support(cli: &Cli, db: Option<&SqlStore>) -> Result<SupportAccounts> {
    let registry = SupportAccounts::known_airlines();
    let (mut support, unknown) = registry.select(&cli.support);
    for name in unknown {
        match db.map(|d| d.resolve_screen_name(&name)).transpose()?.flatten() {
            Some(id) => support.insert_named(&name, id),
            None => bail!("unknown support account {name:?}"),
        }
    }
    merge_support_from_env(&mut support);
    Ok(support)
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();

    let db = cli.db.as_ref().map(SqlStore::open).transpose()?;
    let support = resolve_support(&cli, db.as_ref())?;
    tracing::info!("Support accounts: {:?}", support.ids());

    let ancestors = match cli.ancestors {
        AncestorsArg::Participants => AncestorPolicy::Participants { max_depth: cli.max_ancestors },
        AncestorsArg::FirstSupport => AncestorPolicy::FirstSupportMention,
    };
    let descendants = DescendantOptions {
        max_results: cli.max_replies,
        max_depth: cli.reply_depth,
        third_party: match cli.third_party {
            ThirdPartyArg::Prune => ThirdPartyReplies::Prune,
            ThirdPartyArg::Traverse => ThirdPartyReplies::Traverse,
            ThirdPartyArg::Truncate => ThirdPartyReplies::Truncate,
        },
    };
    let execution = match cli.execution {
        ExecutionArg::Sequential => Execution::Sequential,
        ExecutionArg::Parallel => Execution::Parallel,
        ExecutionArg::Sharded => Execution::ShardedBySupport,
        ExecutionArg::Shared => Execution::SharedSeen,
    };

    let mut miner = ThreadMiner::new()
        .support(support)
        .ancestors(ancestors)
        .admission(match cli.admission {
            AdmissionArg::Counterpart => Admission::Counterpart,
            AdmissionArg::AnySupport => Admission::AnySupport,
        })
        .descendants(descendants)
        .execution(execution)
        .recursive(cli.recursive)
        .file_concurrency(cli.file_concurrency)
        .progress(!cli.no_progress);
    if let Some(n) = cli.threads { miner = miner.parallelism(n); }
    if !cli.seed.is_empty() { miner = miner.seeds(cli.seed.iter().copied()); }

    let corpus = match (&cli.input, &db) {
        (Some(dir), _) => miner.clone().input_dir(dir).load_files()?,
        (None, Some(store)) if cli.full_scan => miner.load_store(store)?,
        (None, Some(store)) => miner.load_sql_components(store)?,
        (None, None) => bail!("either --input or --db is required"),
    };

    let buf = miner.options().write_buffer_bytes;
    let mut file_sink: Option<Box<dyn ConversationSink>> = match (&cli.out, cli.format) {
        (Some(path), FormatArg::Ndjson) => Some(Box::new(NdjsonSink::create(path, buf)?)),
        (Some(path), FormatArg::Text) => Some(Box::new(TextSink::create(path, buf)?)),
        (None, _) if cli.store_conversations => None,
        (None, FormatArg::Ndjson) => Some(Box::new(NdjsonSink::stdout())),
        (None, FormatArg::Text) => Some(Box::new(TextSink::stdout())),
    };
    let mut sql_sink = match (&db, cli.store_conversations) {
        (Some(store), true) => Some(SqlSink::new(store, true)?),
        _ => None,
    };

    let mut tee = TeeSink::new();
    if let Some(s) = file_sink.as_deref_mut() { tee.push(s); }
    if let Some(s) = sql_sink.as_mut() { tee.push(s); }

    let report = miner.mine(&corpus, &mut tee)?;
    if let Some(path) = &cli.report {
        report.write_json(path)?;
        tracing::info!("Report written to {}", path.display());
    }
    Ok(())
}
