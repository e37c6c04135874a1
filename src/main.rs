//! RAG Trial Inspector CLI
//!
//! Inspect evaluation trials and prepare vector-store collections for re-runs.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rag_trial_inspector::{
    cache::TrialCache,
    config::Config,
    identity::CollectionIdentity,
    report::{Scoreboard, TrialSlot, render_comparison, render_trial_summary},
    runner::RunOrchestrator,
    selector::BestModuleSelector,
    store::{LoadMode, latest_trial, load_trial_with_mode, trial_exists},
    testcase::TestCaseBook,
    vector_store::{CollectionLifecycleManager, EvictionState, HttpConnector},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_TEST_CASES: &str = "scripts/test-config.yaml";

/// RAG Trial Inspector - evaluation trial reports and collection lifecycle
#[derive(Parser)]
#[command(name = "trial-inspector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    selection: Selection,

    #[command(subcommand)]
    command: Commands,
}

/// How the best module of each node is chosen.
#[derive(Args)]
struct Selection {
    /// Rank modules by this metric instead of the evaluator's best flag
    #[arg(long, global = true, value_name = "METRIC")]
    best_by: Option<String>,

    /// With --best-by, prefer the lowest value
    #[arg(long, global = true, requires = "best_by")]
    lowest: bool,
}

impl Selection {
    fn selector(&self) -> BestModuleSelector {
        match (&self.best_by, self.lowest) {
            (Some(metric), true) => BestModuleSelector::LowestMetric(metric.clone()),
            (Some(metric), false) => BestModuleSelector::HighestMetric(metric.clone()),
            (None, _) => BestModuleSelector::Flagged,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the best module of every node in a trial
    Summary {
        /// Trial directory, or an evaluator project directory (latest trial is used)
        trial: PathBuf,

        /// Keep nodes whose result directory is missing
        #[arg(long)]
        lenient: bool,
    },

    /// Compare two trials node by node
    Compare {
        /// First trial directory
        trial_a: PathBuf,

        /// Second trial directory
        trial_b: PathBuf,
    },

    /// Print the collection name derived from a test case label
    Identity {
        /// Test case label
        label: String,

        /// Collection prefix (defaults to the configured one)
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Delete the stale collection of a test case label
    Evict {
        /// Test case label
        label: String,
    },

    /// List test cases
    Cases {
        /// Test case file
        #[arg(short, long, default_value = DEFAULT_TEST_CASES)]
        config: PathBuf,
    },

    /// Headline metrics of every test case with results
    Scoreboard {
        /// Test case file
        #[arg(short, long, default_value = DEFAULT_TEST_CASES)]
        config: PathBuf,
    },

    /// Evict, evaluate and summarize one test case
    Run {
        /// Test case name
        test_case: String,

        /// Test case file
        #[arg(short, long, default_value = DEFAULT_TEST_CASES)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let cli = Cli::parse();
    let selector = cli.selection.selector();

    match cli.command {
        Commands::Summary { trial, lenient } => cmd_summary(trial, lenient, &selector),
        Commands::Compare { trial_a, trial_b } => {
            cmd_compare(&trial_a, &trial_b, &selector);
            Ok(())
        }
        Commands::Identity { label, prefix } => cmd_identity(label, prefix),
        Commands::Evict { label } => cmd_evict(label).await,
        Commands::Cases { config } => cmd_cases(config),
        Commands::Scoreboard { config } => cmd_scoreboard(config, &selector),
        Commands::Run { test_case, config } => cmd_run(test_case, config, &selector).await,
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Accept either a trial directory or a project directory holding numbered trials.
fn resolve_trial(path: &Path) -> Result<PathBuf> {
    if trial_exists(path) {
        return Ok(path.to_path_buf());
    }
    latest_trial(path).with_context(|| format!("No trial found at '{}'", path.display()))
}

fn cmd_summary(path: PathBuf, lenient: bool, selector: &BestModuleSelector) -> Result<()> {
    let root = resolve_trial(&path)?;
    let mode = if lenient { LoadMode::Lenient } else { LoadMode::Strict };
    let trial = load_trial_with_mode(&root, mode).context("Failed to load trial")?;

    println!("{}", render_trial_summary(&trial, selector));
    Ok(())
}

fn cmd_compare(trial_a: &Path, trial_b: &Path, selector: &BestModuleSelector) {
    let left = TrialSlot::load(trial_a.display().to_string(), trial_a);
    let right = TrialSlot::load(trial_b.display().to_string(), trial_b);

    println!("{}", render_comparison(&left, &right, selector));
}

fn cmd_identity(label: String, prefix: Option<String>) -> Result<()> {
    let prefix = match prefix {
        Some(prefix) => prefix,
        None => load_config()?.collection_prefix,
    };

    println!("{}", CollectionIdentity::derive(&label, &prefix));
    Ok(())
}

async fn cmd_evict(label: String) -> Result<()> {
    let config = load_config()?;
    let identity = CollectionIdentity::derive(&label, &config.collection_prefix);

    println!(
        "Evicting '{}' from {} at {}",
        identity,
        config.vector_store.backend,
        config.vector_store.base_url()
    );

    let manager = CollectionLifecycleManager::new(HttpConnector);
    match manager.evict(&identity, &config.vector_store).await {
        EvictionState::AlreadyAbsent => println!("No collection to evict."),
        EvictionState::Deleted { names } => println!("Deleted: {}", names.join(", ")),
        EvictionState::Degraded { reason, deleted } => {
            if !deleted.is_empty() {
                println!("Deleted: {}", deleted.join(", "));
            }
            println!("Warning: could not confirm eviction ({}).", reason)
        }
    }
    Ok(())
}

fn cmd_cases(config: PathBuf) -> Result<()> {
    let book = TestCaseBook::load(&config).context("Failed to load test cases")?;

    if book.is_empty() {
        println!("No test cases defined in {}", config.display());
        return Ok(());
    }

    println!("Test cases ({})", config.display());
    println!("{}", "─".repeat(60));
    for case in book.list() {
        let status = if case.has_results() { "done" } else { "pending" };
        println!("[{}] {} ({})", case.name, case.description, status);
        println!("    Data:   {}", case.data_dir().display());
        println!("    Trial:  {}", case.trial_dir().display());
    }

    Ok(())
}

fn cmd_scoreboard(config: PathBuf, selector: &BestModuleSelector) -> Result<()> {
    let book = TestCaseBook::load(&config).context("Failed to load test cases")?;
    let mut cache = TrialCache::new();

    println!("{}", Scoreboard::from_book(&book, &mut cache, selector).render());
    Ok(())
}

async fn cmd_run(name: String, cases: PathBuf, selector: &BestModuleSelector) -> Result<()> {
    let config = load_config()?;
    let book = TestCaseBook::load(&cases).context("Failed to load test cases")?;
    let case = book.get(&name)?;

    println!("Running test case: {}", case.name);
    println!("  Description: {}", case.description);
    println!("  Data:        {}", case.data_dir().display());
    println!("  Trial:       {}", case.trial_dir().display());
    println!("  RAG config:  {}", case.rag_config.display());
    println!();

    let start = Instant::now();
    let orchestrator = RunOrchestrator::new(config, HttpConnector);
    let report = orchestrator
        .run(case)
        .await
        .with_context(|| format!("Run of '{}' failed", case.name))?;

    if let EvictionState::Degraded { reason, .. } = &report.eviction {
        println!("Warning: stale collection not confirmed absent ({}).", reason);
    }

    println!("Finished in {:.2?}\n", start.elapsed());
    println!("{}", render_trial_summary(&report.trial, selector));
    Ok(())
}
