use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use review_autopost::settings::{SettingsStore, GENERAL};
use review_autopost::upstream::ReviewSource;
use review_autopost::{app, config, db};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Render the configured template against upstream reviews without posting"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Number of most recent reviews to render
    #[arg(long, default_value = "1")]
    count: usize,

    /// Also print the raw review record
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = Arc::new(config::load(Some(&args.config))?);
    let account_id = cfg
        .non_empty(GENERAL, "account_id")
        .context("general.account_id is not configured")?;

    // Nothing is written; an in-memory database is enough to assemble the pipeline.
    let pool = db::memory_pool().await?;
    let pipeline = app::build(cfg, pool)?;

    let mut reviews = pipeline.source.fetch_reviews(&account_id).await?;
    reviews.sort_by_key(|r| std::cmp::Reverse(r.id()));

    if reviews.is_empty() {
        println!("No reviews found for account {account_id}");
    }
    for review in reviews.iter().take(args.count) {
        println!("--- review {} ---", review.id());
        if args.raw {
            println!("{}", serde_json::to_string_pretty(review.record())?);
        }
        println!("{}", pipeline.twitter.preview(review));
    }
    Ok(())
}
