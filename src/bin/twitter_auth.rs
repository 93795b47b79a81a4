use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use review_autopost::config;
use review_autopost::db;
use review_autopost::twitter::{CallbackParams, TwitterSession};

#[derive(Debug, Parser)]
#[command(author, version, about = "Authorize the Twitter account used for posting")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request a token and print the URL to open in a browser
    Begin,
    /// Finish authorization with the URL Twitter redirected to
    Complete {
        /// Full callback URL (contains state, oauth_token and oauth_verifier)
        #[arg(long, conflicts_with_all = ["state", "oauth_token", "oauth_verifier"])]
        callback_url: Option<String>,
        /// Correlation id printed by `begin` (PIN-based flows)
        #[arg(long, requires_all = ["oauth_token", "oauth_verifier"])]
        state: Option<String>,
        #[arg(long)]
        oauth_token: Option<String>,
        /// Verifier or PIN shown by Twitter
        #[arg(long)]
        oauth_verifier: Option<String>,
    },
    /// Show which account is currently authorized
    Status,
    /// Remove the stored access token
    Revoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    let session = TwitterSession::from_config(&cfg, pool)?;

    match args.command {
        Command::Begin => {
            let request = session.begin_authorization().await?;
            println!("Open this URL and approve access:\n  {}", request.authorize_url);
            println!("Correlation id (needed for PIN flows): {}", request.state);
        }
        Command::Complete {
            callback_url,
            state,
            oauth_token,
            oauth_verifier,
        } => {
            let params = match (callback_url, state, oauth_token, oauth_verifier) {
                (Some(url), _, _, _) => CallbackParams::from_url(&url)?,
                (None, Some(state), Some(oauth_token), Some(oauth_verifier)) => CallbackParams {
                    state,
                    oauth_token,
                    oauth_verifier,
                },
                _ => bail!("pass --callback-url, or --state with --oauth-token and --oauth-verifier"),
            };
            let token = session.complete_authorization(&params).await?;
            info!(screen_name = ?token.screen_name, "authorization complete");
            println!(
                "Authorized as @{}",
                token.screen_name.as_deref().unwrap_or("<unknown>")
            );
        }
        Command::Status => match session.access_token().await? {
            Some(token) => println!(
                "Authorized as @{} (user id {})",
                token.screen_name.as_deref().unwrap_or("<unknown>"),
                token.user_id.as_deref().unwrap_or("?")
            ),
            None => println!("Not authorized"),
        },
        Command::Revoke => {
            if session.forget_access_token().await? {
                println!("Access token removed");
            } else {
                println!("No access token stored");
            }
        }
    }
    Ok(())
}
