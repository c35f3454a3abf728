use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use warden::config::Config;

mod cmd;

#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about = "Session quota and lifecycle manager for AI coding agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// State directory. Defaults to ~/.warden
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the quota window and context usage
    Status,
    /// Check whether a task of the given token estimate fits the window
    Admit { tokens: u64 },
    /// Run context compaction (soft, strategic, or emergency)
    Compact {
        /// Tier to apply; defaults to the recommended tier for current usage
        #[arg(long)]
        tier: Option<String>,
        /// Show what would be reclaimed without persisting
        #[arg(long)]
        preview: bool,
    },
    /// Start a fresh context-tracking session
    NewSession {
        #[arg(long)]
        id: Option<String>,
    },
    /// Watch the schedule and orchestrate sessions until ctrl-c
    Watch,
    /// Replay a completed session log and report its metrics
    Analyze { log: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new(cli.state_dir.clone(), cli.verbose)?;

    // The long-lived watch loop logs to a rolling file under the state
    // directory; one-shot commands log to stderr.
    let _guard = match cli.command {
        Commands::Watch => init_file_tracing(&config),
        _ => {
            init_stderr_tracing(cli.verbose);
            None
        }
    };

    match cli.command {
        Commands::Status => cmd::cmd_status(&config),
        Commands::Admit { tokens } => cmd::cmd_admit(&config, tokens),
        Commands::Compact { tier, preview } => {
            cmd::cmd_compact(&config, tier.as_deref(), preview)
        }
        Commands::NewSession { id } => cmd::cmd_new_session(&config, id.as_deref()),
        Commands::Watch => cmd::cmd_watch(config).await,
        Commands::Analyze { log } => cmd::cmd_analyze(&log),
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "warden=debug" } else { "warden=info" })
    })
}

fn init_stderr_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if config.ensure_directories().is_err() {
        init_stderr_tracing(config.verbose);
        return None;
    }
    let appender = tracing_appender::rolling::daily(&config.state_dir, "warden.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.verbose))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
