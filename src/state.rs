//! Durable publish cursor.
use tracing::{debug, instrument};

use crate::db::{self, Pool};
use crate::error::Result;

/// Highest review id already dispatched. Only moves forward.
#[derive(Debug, Clone)]
pub struct PublishState {
    pool: Pool,
}

impl PublishState {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Current cursor, 0 when nothing was ever published.
    pub async fn get(&self) -> Result<i64> {
        db::get_last_published_review_id(&self.pool).await
    }

    /// Persist `candidate` iff it is greater than the stored cursor.
    #[instrument(skip(self))]
    pub async fn advance(&self, candidate: i64) -> Result<bool> {
        let changed = db::advance_last_published_review_id(&self.pool, candidate).await?;
        debug!(changed, "publish cursor advance");
        Ok(changed)
    }
}
