//! Portal Session CLI
//!
//! Command-line interface for portal credentials and authenticated requests.
//!
//! # Usage
//!
//! ```bash
//! # Store a token (and profile) in a slot
//! portal-session login admin eyJhbGciOi... --profile '{"name": "Dana"}'
//!
//! # Show which slot wins
//! portal-session whoami --format json
//!
//! # Call the backend as the portal would
//! portal-session request GET /projects --page /client/projects
//!
//! # Clear every slot
//! portal-session logout
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "portal-session")]
#[command(about = "Session credentials and authenticated requests for the portals")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a token in a credential slot
    Login {
        /// Slot name (e.g., admin, client, legacy-admin)
        slot: String,

        /// Bearer token
        token: String,

        /// Identity payload as JSON
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Clear every credential slot
    Logout,

    /// Show the slot whose token would be sent
    Whoami {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Send a request through the session client
    Request {
        /// HTTP method (GET, POST, ...)
        method: String,

        /// Path relative to the base URL, or an absolute URL
        path: String,

        /// JSON body
        #[arg(short, long)]
        body: Option<String>,

        /// Page path to issue the request from (overrides page_url's path)
        #[arg(long)]
        page: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref())?;
    init_logging(&config.log_level, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    let credentials = commands::open_credentials(&config)?;

    match cli.command {
        Commands::Login { slot, token, profile } => {
            commands::login(&credentials, &slot, &token, profile.as_deref()).await
        }
        Commands::Logout => commands::logout(&credentials).await,
        Commands::Whoami { format } => commands::whoami(&credentials, format).await,
        Commands::Request { method, path, body, page } => {
            commands::request(&config, credentials, &method, &path, body.as_deref(), page.as_deref())
                .await
        }
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
