use anyhow::Context;
use clap::{Parser, Subcommand};
use misp_global_search::{
    config::{Config, SourceMode},
    logging::init_tracing,
    reindex::{CycleReport, ReindexCoordinator},
    source::create_fetcher,
    store::{IndexStore, MeilisearchStore},
    watcher::{FreshnessWatcher, GithubCommits, PollOutcome},
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mgs-indexer")]
#[command(about = "Index MISP galaxies, objects and taxonomies into Meilisearch", long_about = None)]
struct Cli {
    /// Configuration file (overrides CONFIG_PATH)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Fetch sources through the GitHub API instead of local checkouts
    #[arg(short, long)]
    remote: bool,

    /// Print the cycle report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// First-time load straight into the production indexes
    Index,

    /// Rebuild every index into staging indexes and swap them in
    Update,

    /// Delete every index in the store
    Clean {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Poll upstream repositories and reindex on change
    Watch {
        /// Poll once and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        std::env::set_var("CONFIG_PATH", path);
    }
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    if cli.remote {
        config.sources.mode = SourceMode::Remote;
    }

    init_tracing(&config.observability);
    misp_global_search::metrics::init_metrics()?;

    let store: Arc<dyn IndexStore> = Arc::new(
        MeilisearchStore::new(&config.meilisearch).context("failed to create store client")?,
    );
    let fetcher = create_fetcher(&config.sources).context("failed to create source fetcher")?;
    let coordinator = Arc::new(ReindexCoordinator::new(
        store,
        fetcher,
        config.indexes.clone(),
    ));

    match cli.command {
        Commands::Index => {
            let report = coordinator.bootstrap().await.context("direct load failed")?;
            print_report(&report, cli.json)?;
        }

        Commands::Update => {
            let report = coordinator.run_cycle().await.context("reindex cycle failed")?;
            print_report(&report, cli.json)?;
        }

        Commands::Clean { yes } => {
            if !yes && !confirm("Delete every index in the store?")? {
                println!("Aborted");
                return Ok(());
            }
            let deleted = coordinator.clean().await.context("clean failed")?;
            println!("Deleted {} index(es)", deleted.len());
            for name in deleted {
                println!("  - {}", name);
            }
        }

        Commands::Watch { once } => {
            let revisions = Arc::new(GithubCommits::new(&config.sources)?);
            let watcher = Arc::new(FreshnessWatcher::new(
                coordinator,
                revisions,
                &config.sources,
                &config.watcher,
            ));

            if once {
                match watcher.poll_once().await.context("reindex cycle failed")? {
                    PollOutcome::Unchanged => println!("No upstream changes"),
                    PollOutcome::Reindexed { changed, report } => {
                        println!("Changed: {}", changed.join(", "));
                        print_report(&report, cli.json)?;
                    }
                }
            } else {
                tokio::select! {
                    _ = watcher.run() => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &CycleReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "Mode: {}  Duration: {:.2}s  Swap confirmed: {}",
        report.mode,
        report.duration_ms as f64 / 1000.0,
        report.swap_confirmed
    );
    for collection in &report.collections {
        let summary = &collection.summary;
        println!(
            "  {:<16} {:<20} {:>7} records  {:>5} files  {:>4} skipped  {:>4} failed",
            collection.collection.to_string(),
            collection.index,
            collection.records_written,
            summary.files,
            summary.skipped_files,
            summary.failed_files
        );
        for diagnostic in &summary.diagnostics {
            println!(
                "      {:?} {}: {}",
                diagnostic.kind, diagnostic.path, diagnostic.reason
            );
        }
    }
    if !report.retired.is_empty() {
        println!("Retired: {}", report.retired.join(", "));
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    use std::io::Write;

    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
