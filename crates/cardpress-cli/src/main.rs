//! Cardpress CLI - Publish local playlists to Yoto MYO cards
//!
//! Provides commands for:
//! - Device-code authentication with the Yoto platform
//! - Listing the local playlist library
//! - Publishing a playlist as a Make-Your-Own card

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod library;
mod output;

use cardpress_core::config::Config;
use commands::{
    auth::{LoginCommand, LogoutCommand, StatusCommand},
    completions::CompletionsCommand,
    playlists::PlaylistsCommand,
    publish::PublishCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "cardpress", version, about = "Publish local playlists to Yoto MYO cards")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use alternate playlist library directory
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authenticate with the Yoto platform via the device-code flow
    Login(LoginCommand),
    /// Remove stored credentials
    Logout(LogoutCommand),
    /// Check authentication status
    Status(StatusCommand),
    /// List playlists in the local library
    Playlists(PlaylistsCommand),
    /// Publish a playlist as a MYO card
    Publish(PublishCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Resolved invocation context shared by all commands
pub struct CliContext {
    pub config: Config,
    pub library_dir: PathBuf,
    pub format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);
    for error in config.validate() {
        eprintln!("\u{26a0} Warning: invalid config value {error}");
    }

    // Setup tracing
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let library_dir = cli
        .library
        .clone()
        .unwrap_or_else(|| config.library.dir.clone());

    let ctx = CliContext {
        config,
        library_dir,
        format,
    };

    match cli.command {
        Commands::Login(cmd) => cmd.execute(&ctx).await,
        Commands::Logout(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Playlists(cmd) => cmd.execute(&ctx).await,
        Commands::Publish(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(),
    }
}
