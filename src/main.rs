use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "ghscout")]
#[command(about = "Discover branches, tags and pull requests of a GitHub repository")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover heads with the configured traits
    Scan(cli::scan::ScanOptions),
    /// Check whether a path exists at a head (or read it)
    Probe(cli::probe::ProbeOptions),
    /// Show or refresh the installation token
    Token {
        /// Mint a new token even if the current one is fresh
        #[arg(long)]
        refresh: bool,
        /// Organisation or user (multi-target apps only)
        #[arg(long)]
        target: Option<String>,
        /// List the accounts the app is installed on
        #[arg(long)]
        list_targets: bool,
    },
    /// Store the GitHub App private key in the OS keychain
    Login {
        /// GitHub App id
        #[arg(long)]
        app_id: String,
        /// PEM file to import (read from stdin when omitted)
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Print the config file location only
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Scan(options) => cli::scan::run(config, options).await,
        Commands::Probe(options) => cli::probe::run(config, options).await,
        Commands::Token {
            refresh,
            target,
            list_targets,
        } => cli::token::run(config, refresh, target, list_targets).await,
        Commands::Login { app_id, key_file } => cli::login::run(config, app_id, key_file),
        Commands::Config { path } => cli::config::run(config, path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", ghscout::core::error_help::format_error_with_help(&e));
            ExitCode::FAILURE
        }
    }
}
