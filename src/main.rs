use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use review_autopost::{app, config, db, scheduler};

#[derive(Debug, Parser)]
#[command(author, version, about = "Post new reviews to social media as they arrive")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run the pipeline once and exit instead of polling on an interval
    #[arg(long)]
    once: bool,
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
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let pipeline = app::build(cfg.clone(), pool)?;

    if args.once {
        let outcome = pipeline.poller.run().await?;
        info!(?outcome, "single run finished");
        return Ok(());
    }

    let shutdown = scheduler::interrupt()?;
    let interval = Duration::from_secs(cfg.app.poll_interval_secs);
    info!(interval_secs = interval.as_secs(), "starting review poller");
    let runs = scheduler::run_every(&pipeline.poller, interval, shutdown).await;
    info!(runs, "review poller stopped");
    Ok(())
}
