use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use simgroup::config::{EngineConfig, OversizedBucketPolicy};
use simgroup::core::CandidateStats;
use simgroup::services::{
    BruteForceClusteringService, ClusteringService, EmbeddingLoader, GroupingReport,
    HistoryService, LoadedInput, LshClusteringService, RunRecord, similar_sets,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "simgroup",
    version,
    about = "Group near-duplicate items by embedding similarity"
)]
struct Cli {
    /// Log engine internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group embeddings whose cosine similarity meets a threshold
    Group(GroupArgs),

    /// Work with the run history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },

    /// Inspect engine configuration
    Config {
        #[command(subcommand)]
        command: ConfigCmd,
    },
}

#[derive(clap::Args, Debug)]
struct GroupArgs {
    /// JSON / JSONL file, or directory of per-item JSON vectors
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Minimum cosine similarity for two items to be linked
    #[arg(short, long, default_value_t = 0.95, allow_negative_numbers = true)]
    threshold: f32,

    /// Engine config file (default: `<config dir>/simgroup/config.json`)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of hash tables
    #[arg(long)]
    tables: Option<usize>,

    /// Hyperplanes per table (at most 64)
    #[arg(long)]
    planes: Option<usize>,

    /// Seed for hyperplane generation
    #[arg(long)]
    seed: Option<u64>,

    /// Buckets larger than this get the oversized policy
    #[arg(long)]
    max_bucket_size: Option<usize>,

    /// What to do with oversized buckets
    #[arg(long, value_enum)]
    oversized: Option<OversizedArg>,

    /// Compare every pair exactly instead of using LSH
    #[arg(long)]
    exact: bool,

    /// Also print items that matched nothing
    #[arg(long)]
    keep_singletons: bool,

    /// Write groups and stats as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not record this run in the history ledger
    #[arg(long)]
    no_history: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OversizedArg {
    Skip,
    Exhaustive,
}

impl From<OversizedArg> for OversizedBucketPolicy {
    fn from(arg: OversizedArg) -> Self {
        match arg {
            OversizedArg::Skip => OversizedBucketPolicy::Skip,
            OversizedArg::Exhaustive => OversizedBucketPolicy::Exhaustive,
        }
    }
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List recorded grouping runs
    List {
        /// Directory holding the history ledger
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// Delete all recorded runs
    Clear {
        /// Directory holding the history ledger
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Print the effective engine config as JSON
    Show {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct GroupOutput<'a> {
    groups: Vec<Vec<&'a str>>,
    stats: &'a CandidateStats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Group(args) => run_group(args)?,

        Commands::History { command } => match command {
            HistoryCmd::List { path } => {
                let history = HistoryService::in_dir(&path);
                let records = history.list()?;
                if records.is_empty() {
                    println!("No runs recorded in {}", history.path().display());
                    return Ok(());
                }

                println!("🗂️  Grouping History:");
                for (i, rec) in records.iter().enumerate() {
                    println!(
                        "[{}] {}\n     input: {} ({})\n     strategy: {}, threshold: {}\n     items: {}, groups: {}, grouped: {}\n",
                        i,
                        rec.timestamp,
                        rec.input,
                        short_digest(&rec.input_digest),
                        rec.strategy,
                        rec.threshold,
                        rec.item_count,
                        rec.group_count,
                        rec.grouped_items
                    );
                }
            }

            HistoryCmd::Clear { path, yes } => {
                let history = HistoryService::in_dir(&path);
                let confirmed = yes
                    || Confirm::new()
                        .with_prompt(format!("Delete all runs in {}?", history.path().display()))
                        .default(false)
                        .interact()?;
                if !confirmed {
                    println!("Aborted; history left untouched.");
                    return Ok(());
                }
                let removed = history.clear()?;
                println!("🧹 Removed {} record(s)", removed);
            }
        },

        Commands::Config { command } => match command {
            ConfigCmd::Show { config } => {
                let config = resolve_config(config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

fn run_group(args: GroupArgs) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(tables) = args.tables {
        config.num_tables = tables;
    }
    if let Some(planes) = args.planes {
        config.planes_per_table = planes;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max) = args.max_bucket_size {
        config.max_bucket_size = max;
    }
    if let Some(policy) = args.oversized {
        config.oversized_bucket_policy = policy.into();
    }
    config.validate().context("Invalid engine configuration")?;

    println!("▶ Loading embeddings from: {}", args.input.display());
    let input = load_input(&args.input)?;
    if input.is_empty() {
        println!("No embeddings found.");
        return Ok(());
    }

    let strategy = if args.exact { "exact" } else { "lsh" };
    let service: Box<dyn ClusteringService> = if args.exact {
        Box::new(BruteForceClusteringService::new())
    } else {
        Box::new(LshClusteringService::new(config.clone())?)
    };

    println!(
        "▶ Grouping {} embeddings ({} strategy, threshold {})…",
        input.len(),
        strategy,
        args.threshold
    );
    let report: GroupingReport = benchmark("grouping", || {
        service.group_with_report(&input.embeddings, args.threshold)
    })
    .context("Grouping failed")?;

    print_groups(&input, &report, args.keep_singletons);

    if report.stats.oversized_buckets_skipped > 0 {
        println!(
            "⚠️  {} oversized bucket(s) were skipped; some similar items may be missing from groups.",
            report.stats.oversized_buckets_skipped
        );
    }

    if let Some(output) = &args.output {
        write_output(output, &input, &report, args.keep_singletons)?;
        println!("✅ Wrote groups to {}", output.display());
    }

    if !args.no_history {
        let history = HistoryService::in_dir(history_dir(&args.input));
        let record = RunRecord::new(
            &args.input,
            &input.digest,
            strategy,
            args.threshold,
            &config,
            &report.groups,
        );
        history.append(&record)?;
        println!("✅ Recorded run in {}", history.path().display());
    }

    Ok(())
}

/// Explicit `--config` must exist; the default location is optional.
fn resolve_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => match EngineConfig::default_path() {
            Some(default) => EngineConfig::load_or_default(&default)
                .with_context(|| format!("Failed to load config {:?}", default)),
            None => Ok(EngineConfig::default()),
        },
    }
}

fn load_input(path: &Path) -> Result<LoadedInput> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Reading embeddings…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let input = EmbeddingLoader::new()
        .load(path)
        .with_context(|| format!("Failed to load embeddings from {:?}", path));
    spinner.finish_with_message("Load complete");
    input
}

/// The ledger lives in the input directory, or next to an input file.
fn history_dir(input: &Path) -> &Path {
    if input.is_dir() {
        input
    } else {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

fn visible_groups(report: &GroupingReport, keep_singletons: bool) -> Vec<Vec<usize>> {
    if keep_singletons {
        report.groups.clone()
    } else {
        similar_sets(&report.groups)
    }
}

fn print_groups(input: &LoadedInput, report: &GroupingReport, keep_singletons: bool) {
    let groups = visible_groups(report, keep_singletons);
    if groups.is_empty() {
        println!("No similar items found.");
        return;
    }

    println!("Found {} group(s):", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!(" Group {}:", i + 1);
        for &item in group {
            println!("   ▶ {}", input.ids[item]);
        }
    }
    println!(
        "\n{} pairs scored, {} matched, {} repeat pairs skipped",
        report.stats.pairs_scored, report.stats.matches, report.stats.duplicate_pairs
    );
}

fn write_output(
    path: &Path,
    input: &LoadedInput,
    report: &GroupingReport,
    keep_singletons: bool,
) -> Result<()> {
    let groups = visible_groups(report, keep_singletons)
        .into_iter()
        .map(|group| group.iter().map(|&i| input.ids[i].as_str()).collect())
        .collect();
    let out = GroupOutput {
        groups,
        stats: &report.stats,
    };
    fs::write(path, serde_json::to_string_pretty(&out)?)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}

/// First 12 characters of a ledger digest. The ledger is user-editable, so
/// this must not assume ASCII.
fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}
