//! # Portfolio API CLI (`portfolio-api`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `portfolio-api init` | Create the SQLite database and schema |
//! | `portfolio-api seed` | Replace projects, thoughts and skills with the bundled data |
//! | `portfolio-api serve` | Start the HTTP server (reseeds first when `RESET_DB` is set) |
//!
//! ## Examples
//!
//! ```bash
//! portfolio-api --config ./config/portfolio.toml init
//! PORT=3000 RESET_DB=true portfolio-api serve
//! ```

use clap::{Parser, Subcommand};
use portfolio_api::{config, migrate, seed, server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Portfolio API: projects, thoughts and skills over HTTP.
#[derive(Parser)]
#[command(name = "portfolio-api", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional; defaults apply when the file does not exist. Environment
    /// variables (`PORT`, `DATABASE_URL`, `RESET_DB`, `CLOUDINARY_*`)
    /// override it.
    #[arg(long, global = true, default_value = "./config/portfolio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Clear projects, thoughts and skills, then load the bundled datasets.
    Seed,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Seed => {
            seed::run_seed(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
