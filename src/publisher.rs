//! Destinations a review can be dispatched to.
//!
//! The poller only knows the [`Publisher`] capability. Concrete
//! destinations are composed by whoever assembles the pipeline.
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::model::Review;
use crate::settings::SettingsStore;
use crate::template::Renderer;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, review: &Review) -> Result<()>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    async fn publish(&self, review: &Review) -> Result<()> {
        (**self).publish(review).await
    }
}

/// Authenticated handle on a social network account.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Post `text`, returning the remote post id.
    async fn post(&self, text: &str) -> anyhow::Result<String>;
}

/// Hands out authenticated clients. Authorization itself happens elsewhere.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn client(&self) -> Result<Arc<dyn SocialClient>>;
}

/// Renders a review with the section's template and posts it.
pub struct SocialPublisher<S> {
    section: String,
    settings: Arc<dyn SettingsStore>,
    session: S,
    renderer: Renderer,
}

impl<S: SessionProvider> SocialPublisher<S> {
    pub fn new(
        section: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
        session: S,
        renderer: Renderer,
    ) -> Self {
        Self {
            section: section.into(),
            settings,
            session,
            renderer,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Message that would be posted for `review`, without posting it.
    pub fn preview(&self, review: &Review) -> String {
        let template = self.settings.get(&self.section, "template").unwrap_or_default();
        self.renderer.render(&template, review.record())
    }
}

#[async_trait]
impl<S: SessionProvider> Publisher for SocialPublisher<S> {
    #[instrument(skip_all, fields(section = %self.section, review_id = review.id()))]
    async fn publish(&self, review: &Review) -> Result<()> {
        if !self.settings.flag(&self.section, "enabled") {
            debug!("destination disabled; skipping");
            return Ok(());
        }

        let client = self.session.client().await?;
        let message = self.preview(review);
        if message.trim().is_empty() {
            debug!("template rendered empty; nothing to post");
            return Ok(());
        }

        let post_id = client
            .post(&message)
            .await
            .map_err(|e| PipelineError::PublishFailed {
                review_id: review.id(),
                reason: format!("{:#}", e),
            })?;
        info!(%post_id, "review posted");
        Ok(())
    }
}

/// Publishes to each member in order; the first failure stops the review.
#[derive(Default)]
pub struct PublisherSet {
    members: Vec<Box<dyn Publisher>>,
}

impl PublisherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Publisher + 'static>(mut self, publisher: P) -> Self {
        self.members.push(Box::new(publisher));
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl Publisher for PublisherSet {
    async fn publish(&self, review: &Review) -> Result<()> {
        for member in &self.members {
            member.publish(review).await?;
        }
        Ok(())
    }
}
