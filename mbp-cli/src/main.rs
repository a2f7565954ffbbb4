use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "mbp", about = "Session login and live notifications for mbp")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Stream notifications for the stored session until Ctrl-C
    Listen,
    /// Start a session with a token
    Login(commands::login::LoginArgs),
    /// End the session and forget the stored token
    Logout,
    /// Show the stored session
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Listen => commands::listen::run().await,
        Commands::Login(args) => commands::login::run(args),
        Commands::Logout => commands::logout::run().await,
        Commands::Status => commands::status::run(),
    }
}
