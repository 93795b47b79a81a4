use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use review_autopost::error::{PipelineError, Result};
use review_autopost::model::Review;
use review_autopost::publisher::{
    Publisher, PublisherSet, SessionProvider, SocialClient, SocialPublisher,
};
use review_autopost::settings::{MemorySettings, TWITTER};
use review_autopost::template::{Renderer, TruncateHook};

#[derive(Clone, Default)]
struct RecordingClient {
    posts: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl SocialClient for RecordingClient {
    async fn post(&self, text: &str) -> anyhow::Result<String> {
        if self.fail {
            return Err(anyhow!("twitter error 403 Forbidden: duplicate content"));
        }
        let mut posts = self.posts.lock().await;
        posts.push(text.to_string());
        Ok(format!("tweet-{}", posts.len()))
    }
}

#[derive(Clone, Default)]
struct FakeSession {
    client: RecordingClient,
    handed_out: Arc<AtomicUsize>,
    unauthorized: bool,
}

#[async_trait]
impl SessionProvider for FakeSession {
    async fn client(&self) -> Result<Arc<dyn SocialClient>> {
        if self.unauthorized {
            return Err(PipelineError::AuthInvalid("no access token".into()));
        }
        self.handed_out.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.client.clone()))
    }
}

fn review() -> Review {
    Review::from_value(json!({
        "id": 31,
        "reviewer": { "full_name": "Ana" },
        "stars": 5,
        "comment": "Great!"
    }))
    .unwrap()
}

fn settings(enabled: &str, template: &str) -> Arc<MemorySettings> {
    Arc::new(
        MemorySettings::new()
            .with(TWITTER, "enabled", enabled)
            .with(TWITTER, "template", template),
    )
}

const TEMPLATE: &str = "{reviewer.full_name} rated {stars}/5: {comment}";

#[tokio::test]
async fn renders_template_and_posts() {
    let session = FakeSession::default();
    let publisher = SocialPublisher::new(TWITTER, settings("on", TEMPLATE), session.clone(), Renderer::new());

    publisher.publish(&review()).await.unwrap();

    assert_eq!(
        *session.client.posts.lock().await,
        vec!["Ana rated 5/5: Great!".to_string()]
    );
}

#[tokio::test]
async fn disabled_destination_makes_no_client_call() {
    for flag in ["off", "", "nonsense"] {
        let session = FakeSession::default();
        let publisher =
            SocialPublisher::new(TWITTER, settings(flag, TEMPLATE), session.clone(), Renderer::new());

        publisher.publish(&review()).await.unwrap();

        assert_eq!(session.handed_out.load(Ordering::SeqCst), 0, "flag {flag:?}");
        assert!(session.client.posts.lock().await.is_empty());
    }
}

#[tokio::test]
async fn disabled_destination_ignores_missing_authorization() {
    let session = FakeSession {
        unauthorized: true,
        ..Default::default()
    };
    let publisher = SocialPublisher::new(TWITTER, settings("off", TEMPLATE), session, Renderer::new());
    publisher.publish(&review()).await.unwrap();
}

#[tokio::test]
async fn empty_render_posts_nothing() {
    let session = FakeSession::default();
    let publisher = SocialPublisher::new(TWITTER, settings("on", "   "), session.clone(), Renderer::new());

    publisher.publish(&review()).await.unwrap();

    assert!(session.client.posts.lock().await.is_empty());
}

#[tokio::test]
async fn remote_rejection_becomes_publish_failed() {
    let session = FakeSession {
        client: RecordingClient {
            fail: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let publisher = SocialPublisher::new(TWITTER, settings("on", TEMPLATE), session, Renderer::new());

    let err = publisher.publish(&review()).await.unwrap_err();
    match err {
        PipelineError::PublishFailed { review_id, reason } => {
            assert_eq!(review_id, 31);
            assert!(reason.contains("403"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_authorization_propagates() {
    let session = FakeSession {
        unauthorized: true,
        ..Default::default()
    };
    let publisher = SocialPublisher::new(TWITTER, settings("on", TEMPLATE), session, Renderer::new());
    assert!(matches!(
        publisher.publish(&review()).await,
        Err(PipelineError::AuthInvalid(_))
    ));
}

#[tokio::test]
async fn hooks_shape_the_posted_text() {
    let session = FakeSession::default();
    let publisher = SocialPublisher::new(
        TWITTER,
        settings("on", TEMPLATE),
        session.clone(),
        Renderer::new().with_hook(TruncateHook { max_chars: 8 }),
    );

    publisher.publish(&review()).await.unwrap();

    assert_eq!(*session.client.posts.lock().await, vec!["Ana rat…".to_string()]);
}

#[tokio::test]
async fn publisher_set_fans_out_and_stops_on_failure() {
    let first = FakeSession::default();
    let broken = FakeSession {
        client: RecordingClient {
            fail: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let last = FakeSession::default();

    let set = PublisherSet::new()
        .with(SocialPublisher::new(TWITTER, settings("on", "a {comment}"), first.clone(), Renderer::new()))
        .with(SocialPublisher::new(TWITTER, settings("on", "b {comment}"), broken, Renderer::new()))
        .with(SocialPublisher::new(TWITTER, settings("on", "c {comment}"), last.clone(), Renderer::new()));
    assert_eq!(set.len(), 3);

    assert!(set.publish(&review()).await.is_err());
    assert_eq!(*first.client.posts.lock().await, vec!["a Great!".to_string()]);
    assert!(last.client.posts.lock().await.is_empty());
}
