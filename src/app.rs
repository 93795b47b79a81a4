//! Pipeline assembly: everything is built once here and passed by reference.
use anyhow::{Context, Result};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ReviewCache;
use crate::config::Config;
use crate::db::Pool;
use crate::poller::ReviewPoller;
use crate::publisher::{PublisherSet, SocialPublisher};
use crate::settings::{SettingsStore, TWITTER};
use crate::state::PublishState;
use crate::template::{Renderer, TruncateHook};
use crate::twitter::TwitterSession;
use crate::upstream::CodeableClient;

pub struct Pipeline {
    pub poller: ReviewPoller,
    pub source: Arc<CodeableClient>,
    pub twitter: Arc<SocialPublisher<TwitterSession>>,
}

pub fn build(cfg: Arc<Config>, pool: Pool) -> Result<Pipeline> {
    let settings: Arc<dyn SettingsStore> = cfg.clone();

    let source = Arc::new(CodeableClient::with_base_url(
        Url::parse(&cfg.general.api_base).context("invalid general.api_base")?,
    )?);

    let renderer = Renderer::new().with_hook(TruncateHook {
        max_chars: cfg.twitter.max_length,
    });
    let twitter = Arc::new(SocialPublisher::new(
        TWITTER,
        settings.clone(),
        TwitterSession::from_config(&cfg, pool.clone())?,
        renderer,
    ));

    let publishers = PublisherSet::new().with(twitter.clone());
    let poller = ReviewPoller::new(
        settings,
        source.clone(),
        ReviewCache::new(Duration::from_secs(cfg.app.cache_ttl_secs)),
        PublishState::new(pool),
        Arc::new(publishers),
    )
    .with_first_run(cfg.app.first_run);

    Ok(Pipeline {
        poller,
        source,
        twitter,
    })
}
