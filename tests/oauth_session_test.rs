use chrono::{Duration, Utc};
use reqwest::Url;

use review_autopost::config::{self, Config};
use review_autopost::db;
use review_autopost::error::PipelineError;
use review_autopost::model::AccessToken;
use review_autopost::publisher::SessionProvider;
use review_autopost::twitter::{CallbackParams, Consumer, TwitterSession};

async fn session() -> (TwitterSession, db::Pool) {
    let pool = db::memory_pool().await.unwrap();
    let session = TwitterSession::new(
        Url::parse("https://api.twitter.com/").unwrap(),
        Consumer {
            key: "ck".into(),
            secret: "cs".into(),
        },
        "http://localhost:8080/twitter/callback".into(),
        pool.clone(),
    )
    .unwrap();
    (session, pool)
}

fn params(state: &str, token: &str) -> CallbackParams {
    CallbackParams {
        state: state.into(),
        oauth_token: token.into(),
        oauth_verifier: "verifier".into(),
    }
}

#[tokio::test]
async fn unknown_correlation_id_is_rejected() {
    let (session, _pool) = session().await;
    let err = session
        .complete_authorization(&params("never-issued", "tok"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AuthInvalid(_)));
    assert!(session.access_token().await.unwrap().is_none());
}

#[tokio::test]
async fn mismatched_token_is_rejected_and_consumed() {
    let (session, pool) = session().await;
    db::save_request_token(&pool, "s1", "issued-token", "secret", Utc::now() + Duration::minutes(15))
        .await
        .unwrap();

    let err = session
        .complete_authorization(&params("s1", "forged-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AuthInvalid(ref m) if m.contains("does not match")));

    // request tokens are single use: a retry with the right token fails too
    let err = session
        .claim_request_token(&params("s1", "issued-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AuthInvalid(_)));
}

#[tokio::test]
async fn expired_request_token_is_rejected() {
    let (session, pool) = session().await;
    db::save_request_token(&pool, "s2", "tok", "secret", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    let err = session
        .claim_request_token(&params("s2", "tok"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AuthInvalid(ref m) if m.contains("expired")));
}

#[tokio::test]
async fn matching_token_is_claimed() {
    let (session, pool) = session().await;
    db::save_request_token(&pool, "s3", "tok", "secret", Utc::now() + Duration::minutes(5))
        .await
        .unwrap();

    let request = session.claim_request_token(&params("s3", "tok")).await.unwrap();
    assert_eq!(request.token, "tok");
    assert_eq!(request.token_secret, "secret");
}

#[tokio::test]
async fn client_requires_stored_access_token() {
    let (session, pool) = session().await;
    assert!(matches!(
        session.client().await,
        Err(PipelineError::AuthInvalid(_))
    ));

    let token = AccessToken {
        token: "at".into(),
        token_secret: "ats".into(),
        user_id: Some("1".into()),
        screen_name: Some("reviews".into()),
    };
    db::set_option(&pool, "twitter_access_token", &serde_json::to_string(&token).unwrap())
        .await
        .unwrap();

    assert_eq!(session.access_token().await.unwrap(), Some(token));
    assert!(session.client().await.is_ok());

    assert!(session.forget_access_token().await.unwrap());
    assert!(session.client().await.is_err());
}

#[tokio::test]
async fn session_from_example_config() {
    let cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    let pool = db::memory_pool().await.unwrap();
    let session = TwitterSession::from_config(&cfg, pool).unwrap();
    let callback = session.callback_for("abc");
    assert_eq!(callback, "http://localhost:8080/twitter/callback?state=abc");
    let parsed = CallbackParams::from_url(&format!("{callback}&oauth_token=t&oauth_verifier=v")).unwrap();
    assert_eq!(parsed, params_with("abc", "t", "v"));
}

fn params_with(state: &str, token: &str, verifier: &str) -> CallbackParams {
    CallbackParams {
        state: state.into(),
        oauth_token: token.into(),
        oauth_verifier: verifier.into(),
    }
}
