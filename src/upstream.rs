use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::model::Review;

const CODEABLE_API_BASE: &str = "https://api.codeable.io/";

/// Where reviews come from.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(&self, account_id: &str) -> Result<Vec<Review>>;
}

#[derive(Clone)]
pub struct CodeableClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for CodeableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeableClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CodeableClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(Url::parse(CODEABLE_API_BASE)?)
    }

    pub fn with_base_url(base_url: Url) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("review-autopost/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn reviews_url(&self, account_id: &str) -> Result<Url> {
        let segment = urlencoding::encode(account_id.trim());
        self.base_url
            .join(&format!("users/{}/reviews", segment))
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("invalid reviews URL: {e}")))
    }
}

#[async_trait]
impl ReviewSource for CodeableClient {
    async fn fetch_reviews(&self, account_id: &str) -> Result<Vec<Review>> {
        let url = self.reviews_url(account_id)?;
        debug!(%url, "fetching reviews");
        let res = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("request failed: {e}")))?;

        if res.status() != StatusCode::OK {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "review fetch rejected");
            return Err(PipelineError::UpstreamUnavailable(format!(
                "status {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = res
            .text()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("failed to read body: {e}")))?;
        parse_reviews(&body)
    }
}

/// Parse an upstream body. Any element without an integer `id` rejects the
/// whole batch.
pub fn parse_reviews(body: &str) -> Result<Vec<Review>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedReview(format!("body is not JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(PipelineError::MalformedReview(
            "expected a JSON array of reviews".into(),
        ));
    };
    items.into_iter().map(Review::from_value).collect()
}
