use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waitlist_service::{
    api::{ApiServer, AppState},
    config::{write_default_config, Config, LoggingConfig},
    issuer::Issuer,
    verifier::Verifier,
};

/// Waitlist signup and email confirmation service
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The subcommand to execute (defaults to serve)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML configuration file; environment variables apply on top
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Write a default configuration file with a fresh signing secret
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = "waitlist.toml")]
        output: PathBuf,
    },

    /// Print a confirmation link for an address without sending mail
    IssueToken {
        /// Address to bind the link to
        #[arg(long)]
        email: String,
    },

    /// Check a confirmation token and print the address it confirms
    VerifyToken {
        /// Token taken from a confirmation link
        token: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load configuration and start logging with its settings
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    init_tracing(&config.logging);
    info!("Configuration loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init { output } => {
            init_tracing(&LoggingConfig::default());
            write_default_config(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote default configuration to {}", output.display());
        }
        Commands::IssueToken { email } => {
            let config = load_config(config_path)?;
            let settings = config.issuer_settings()?;
            let link = Issuer::from_settings(&settings).confirmation_link(&email, Utc::now())?;
            println!("{link}");
        }
        Commands::VerifyToken { token } => {
            let config = load_config(config_path)?;
            let verifier = Verifier::from_settings(&config.verifier_settings()?);
            match verifier.confirm(Some(&token), Utc::now()) {
                Ok(claims) => {
                    let expires = claims
                        .expires_at()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| claims.exp.to_string());
                    println!("valid: {} (expires {})", claims.email, expires);
                }
                Err(e) => {
                    println!("rejected: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve => {
            let config = load_config(config_path)?;
            let verifier = Verifier::from_settings(
                &config
                    .verifier_settings()
                    .context("The confirmation endpoint needs a signing secret")?,
            );

            let state = match config.issuer_settings() {
                Ok(settings) => AppState::new(Issuer::from_settings(&settings), verifier),
                Err(e) => {
                    warn!("Serving confirmations only: {}", e);
                    AppState::verifier_only(verifier)
                }
            };

            let server = ApiServer::new(state, config.api.bind_address.clone());
            server.start().await?;
        }
    }

    Ok(())
}
