//! Error kinds surfaced by a single pipeline run.
//!
//! None of these terminate the process: every variant is scoped to one
//! `ReviewPoller::run` invocation (or one OAuth callback request).
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream fetch failed or returned a non-success status. No state is mutated.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered 200 but the payload is not a batch of reviews.
    #[error("malformed review payload: {0}")]
    MalformedReview(String),

    /// OAuth callback did not match an issued request token, or no access token is stored.
    #[error("authorization invalid: {0}")]
    AuthInvalid(String),

    /// The destination rejected the post for this review.
    #[error("publishing review {review_id} failed: {reason}")]
    PublishFailed { review_id: i64, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether the next scheduler tick is expected to retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::UpstreamUnavailable(_) | PipelineError::PublishFailed { .. }
        )
    }
}
