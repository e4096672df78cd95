//! shopheal CLI - Main Entry Point
//!
//! Runs the storefront E2E suite once, or drives a full healing session
//! (run, classify, repair, re-run) against a live Shopify storefront theme.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{heal, run, specs};

/// shopheal - self-healing E2E suite for a Shopify storefront theme
#[derive(Parser)]
#[command(name = "shopheal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Storefront base URL
    #[arg(
        long,
        env = "SHOPHEAL_STOREFRONT_URL",
        default_value = "http://127.0.0.1:9292",
        global = true
    )]
    storefront_url: String,

    /// Storefront password, for password-gated shops
    #[arg(long, env = "SHOPHEAL_STORE_PASSWORD", global = true)]
    password: Option<String>,

    /// Path to the case specs directory
    #[arg(long, default_value = "specs", global = true)]
    specs: PathBuf,

    /// Output directory for results and screenshots
    #[arg(long, default_value = "test-results", global = true)]
    output: PathBuf,

    /// Browser projects to run cases under (repeatable)
    #[arg(long = "project", global = true)]
    projects: Vec<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suite once, without healing
    Run(run::RunArgs),

    /// Run a full healing session: run, classify, repair, re-run
    Heal(heal::HealArgs),

    /// List discovered case specs
    Specs(specs::SpecsArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let ctx = commands::Context {
        storefront_url: cli.storefront_url,
        password: cli.password,
        specs_dir: cli.specs,
        output_dir: cli.output,
        projects: commands::parse_projects(&cli.projects)?,
        format: cli.format,
    };

    let success = match cli.command {
        Commands::Run(args) => run::execute(args, &ctx).await?,
        Commands::Heal(args) => heal::execute(args, &ctx).await?,
        Commands::Specs(args) => {
            specs::execute(args, &ctx)?;
            true
        }
        Commands::Version => {
            println!("shopheal v{}", shopheal_common::VERSION);
            println!("Self-healing Playwright E2E suite for Shopify storefront themes");
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
