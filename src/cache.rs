//! Time-bounded cache of the last successful upstream batch.
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::model::{Review, ReviewBatch};

#[derive(Debug)]
struct Entry {
    batch: Arc<ReviewBatch>,
    expires_at: DateTime<Utc>,
}

/// Holds at most one batch. Failed fetches never touch the cached entry.
#[derive(Debug)]
pub struct ReviewCache {
    ttl: Duration,
    entry: Option<Entry>,
}

impl ReviewCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(i64::MAX / 1000));
        Self { ttl, entry: None }
    }

    /// Cached batch if still valid, otherwise the result of `fetch`.
    pub async fn get_or_fetch<F, Fut>(&mut self, fetch: F) -> Result<Arc<ReviewBatch>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Review>>>,
    {
        self.get_or_fetch_at(Utc::now(), fetch).await
    }

    pub(crate) async fn get_or_fetch_at<F, Fut>(
        &mut self,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<Arc<ReviewBatch>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Review>>>,
    {
        if let Some(batch) = self.valid_at(now) {
            debug!(expires_at = %self.expires_at().unwrap_or(now), "serving reviews from cache");
            return Ok(batch);
        }

        let reviews = fetch().await?;
        let batch = Arc::new(ReviewBatch::new(reviews, now));
        self.entry = Some(Entry {
            batch: batch.clone(),
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
        Ok(batch)
    }

    fn valid_at(&self, now: DateTime<Utc>) -> Option<Arc<ReviewBatch>> {
        self.entry
            .as_ref()
            .filter(|e| now < e.expires_at)
            .map(|e| e.batch.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|e| e.expires_at)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
