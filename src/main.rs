//! codesim - semantic duplicate detection for code review
//!
//! Indexes every function in a repository as an embedding vector and flags
//! new code that looks like something already written.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use codesim::config;

mod cli;

/// codesim - find the function you already wrote
#[derive(Parser)]
#[command(name = "codesim")]
#[command(author = "Mustafa Saraç <mustafa@mustafasarac.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Function-level semantic index and duplicate detector", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or update the similarity index
    Index {
        /// Path to index (defaults to current directory)
        path: Option<String>,

        /// Rebuild from scratch even if an index exists
        #[arg(short, long)]
        force: bool,

        /// Files that changed since the last build
        #[arg(long, num_args = 1..)]
        changed: Vec<String>,

        /// Take the changed files from git, relative to this revision
        #[arg(long)]
        since: Option<String>,

        /// Remove the index instead of building it
        #[arg(long, conflicts_with_all = ["force", "changed", "since"])]
        clear: bool,
    },

    /// Find functions similar to a given one
    Search {
        /// File containing the function
        file: String,

        /// Function name
        symbol: String,

        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Flag likely duplicates of indexed functions
    Dupes {
        /// Files to check
        #[arg(required = true)]
        files: Vec<String>,

        /// Similarity threshold in [0, 1]
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },

    /// Show version, provider and index status
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_target(false);
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )?;
    } else {
        tracing::subscriber::set_global_default(builder.with_max_level(level).finish())?;
    }

    // Writing defaults must not depend on the current file being valid
    if let Some(Commands::Config { init: true, .. }) = cli.command {
        return config::init_config(cli.config.as_deref());
    }

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("codesim v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Index {
            path,
            force,
            changed,
            since,
            clear,
        }) => {
            let args = cli::index::IndexArgs {
                path: path.as_deref(),
                force,
                changed: &changed,
                since: since.as_deref(),
                clear,
            };
            cli::index::run(config, args).await?;
        }
        Some(Commands::Search { file, symbol, limit }) => {
            cli::search::run(config, &file, &symbol, limit).await?;
        }
        Some(Commands::Dupes { files, threshold }) => {
            cli::dupes::run(config, &files, threshold).await?;
        }
        Some(Commands::Config { show, .. }) => {
            if show {
                config::show_config(&config)?;
            }
        }
        Some(Commands::Info) => {
            cli::info::run(&config).await?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
