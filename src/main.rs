//! ruian-sync: import the Czech address point registry into a local store

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ruian_sync::config::{Config, LogFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::run::RunOptions;

#[derive(Parser)]
#[command(name = "ruian-sync")]
#[command(about = "Import RÚIAN address points into a local store")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the current archive and import it
    Run {
        /// Import a local archive instead of downloading
        #[arg(short, long)]
        archive: Option<PathBuf>,

        /// Truncate towns, streets and numbers before importing
        #[arg(long)]
        rebuild: bool,

        /// Months before the current month to take the archive from
        #[arg(long)]
        months_back: Option<u32>,

        /// Override the archive base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Quiet mode (no progress output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Mark runs interrupted by a crash as failed
    Recover,

    /// Show store statistics and recent import runs
    Status {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Suggest streets matching a query
    SuggestStreets {
        /// Part of the street name
        query: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Suggest house numbers of a street
    SuggestNumbers {
        /// Street id
        street_id: u64,

        /// Part of the house number
        #[arg(default_value = "")]
        query: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete all towns, streets and numbers (run logs are kept)
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = Level::from(&config.logging.level.raised(verbose));
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false);
    match config.logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { ref path, force } = cli.command {
        return commands::init::init_config(path.clone(), force);
    }

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Run {
            archive,
            rebuild,
            months_back,
            base_url,
            quiet,
        } => {
            let options = RunOptions {
                archive,
                rebuild,
                months_back,
                base_url,
                quiet,
            };
            commands::run::run_import(config, options).await
        }
        Commands::Recover => commands::run::recover(config),
        Commands::Status { limit, format } => commands::status::show_status(config, limit, format),
        Commands::SuggestStreets { query, format } => {
            commands::suggest::suggest_street_names(config, query, format)
        }
        Commands::SuggestNumbers {
            street_id,
            query,
            format,
        } => commands::suggest::suggest_street_numbers(config, street_id, query, format),
        Commands::Reset { yes } => commands::reset::reset_store(config, yes),
        Commands::Init { .. } => Ok(()),
    }
}
