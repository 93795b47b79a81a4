//! Fetch → cache → dedup → ordered dispatch.
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::ReviewCache;
use crate::config::FirstRun;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::settings::{SettingsStore, GENERAL};
use crate::state::PublishState;
use crate::upstream::ReviewSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No account id configured.
    ConfigMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Completed {
        fetched: usize,
        published: Vec<i64>,
        cursor: i64,
    },
    /// First run under `FirstRun::Skip`: cursor moved, nothing published.
    Primed { cursor: i64 },
}

pub struct ReviewPoller {
    settings: Arc<dyn SettingsStore>,
    source: Arc<dyn ReviewSource>,
    state: PublishState,
    publisher: Arc<dyn Publisher>,
    first_run: FirstRun,
    // Held for the whole run so overlapping triggers serialise.
    cache: Mutex<ReviewCache>,
}

impl ReviewPoller {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        source: Arc<dyn ReviewSource>,
        cache: ReviewCache,
        state: PublishState,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            settings,
            source,
            state,
            publisher,
            first_run: FirstRun::default(),
            cache: Mutex::new(cache),
        }
    }

    pub fn with_first_run(mut self, first_run: FirstRun) -> Self {
        self.first_run = first_run;
        self
    }

    pub fn state(&self) -> &PublishState {
        &self.state
    }

    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut cache = self.cache.lock().await;

        let Some(account_id) = self.settings.non_empty(GENERAL, "account_id") else {
            debug!("no account id configured; nothing to do");
            return Ok(RunOutcome::Skipped(SkipReason::ConfigMissing));
        };

        let source = self.source.clone();
        let batch = cache
            .get_or_fetch(|| async move { source.fetch_reviews(&account_id).await })
            .await?;

        let cursor = self.state.get().await?;

        if cursor == 0 && self.first_run == FirstRun::Skip {
            if let Some(newest) = batch.newest_id() {
                self.state.advance(newest).await?;
                info!(cursor = newest, "first run: remembered newest review without publishing");
                return Ok(RunOutcome::Primed { cursor: newest });
            }
        }

        let pending = batch.pending_after(cursor);
        debug!(fetched = batch.reviews.len(), pending = pending.len(), cursor, "reviews filtered");

        let mut published = Vec::with_capacity(pending.len());
        for review in pending {
            if let Err(err) = self.publisher.publish(review).await {
                warn!(review_id = review.id(), error = %err, "publish failed; stopping this run");
                return Err(err);
            }
            self.state.advance(review.id()).await?;
            published.push(review.id());
        }

        let cursor = self.state.get().await?;
        if !published.is_empty() {
            info!(count = published.len(), cursor, "published new reviews");
        }
        Ok(RunOutcome::Completed {
            fetched: batch.reviews.len(),
            published,
            cursor,
        })
    }
}
