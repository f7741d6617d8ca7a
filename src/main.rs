// src/main.rs

use abbs_meta::{Config, LocalTree, Reconciler};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "abbs-meta")]
#[command(author, version, about = "Package metadata catalog for abbs trees", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "abbs-meta.toml")]
    config: PathBuf,

    /// Log per-group detail
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database
    Init,
    /// Reconcile configured trees from their checkouts on disk
    Scan {
        /// Only scan this tree
        tree: Option<String>,
    },
    /// Forget a tree's reconciled history
    Reset {
        tree: String,
    },
}

fn run(cli: Cli, cancel: Arc<AtomicBool>) -> Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let db_path = &config.database.path;

    match cli.command {
        Commands::Init => {
            abbs_meta::db::init(db_path)?;
            println!("Catalog initialized at: {}", db_path.display());
        }
        Commands::Scan { tree } => {
            let mut conn = abbs_meta::db::open(db_path)?;
            let layout = config.layout.to_layout();
            let shell = config.shell.to_evaluator();

            for tree_config in &config.trees {
                if tree.as_ref().is_some_and(|only| *only != tree_config.name) {
                    continue;
                }
                let Some(path) = &tree_config.path else {
                    warn!("{}: no checkout path configured, skipped", tree_config.name);
                    continue;
                };

                let local = LocalTree::new(&tree_config.name, path);
                let stats = Reconciler::new(&mut conn, tree_config.clone(), layout.clone(), shell.clone())
                    .with_cancel(cancel.clone())
                    .scan_local(&local)
                    .with_context(|| format!("Failed to scan {}", tree_config.name))?;
                println!(
                    "{}: {} added, {} removed, {} duplicates",
                    tree_config.name, stats.added, stats.removed, stats.duplicates
                );
            }
        }
        Commands::Reset { tree } => {
            let tree_config = config
                .tree(&tree)
                .with_context(|| format!("Unknown tree: {}", tree))?
                .clone();
            let mut conn = abbs_meta::db::open(db_path)?;
            let rows = Reconciler::new(
                &mut conn,
                tree_config,
                config.layout.to_layout(),
                config.shell.to_evaluator(),
            )
            .reset()?;
            println!("{}: {} rows cleared", tree, rows);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let cancel = Arc::new(AtomicBool::new(false));
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current group");
            token.store(true, Ordering::Relaxed);
        }
    });

    tokio::task::spawn_blocking(move || run(cli, cancel)).await?
}
