//! Twitter destination: OAuth 1.0a session handling and the posting client.
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::db::{self, Pool};
use crate::error::{PipelineError, Result};
use crate::model::{AccessToken, RequestToken};
use crate::publisher::{SessionProvider, SocialClient};

pub mod oauth;

use oauth::{authorization_header, parse_form, Credentials, Nonce};

const TWITTER_API_BASE: &str = "https://api.twitter.com/";
const ACCESS_TOKEN_OPTION: &str = "twitter_access_token";
const REQUEST_TOKEN_TTL_MINUTES: i64 = 15;

/// Application credentials (`api_key` / `api_secret`).
#[derive(Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("review-autopost/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Posts on behalf of the authorized account.
#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    base_url: Url,
    consumer: Consumer,
    token: AccessToken,
}

impl fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterClient")
            .field("base_url", &self.base_url)
            .field("screen_name", &self.token.screen_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

impl TwitterClient {
    pub fn new(base_url: Url, consumer: Consumer, token: AccessToken) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url,
            consumer,
            token,
        })
    }

    pub fn build_request(&self, text: &str) -> anyhow::Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("2/tweets")
            .context("invalid Twitter base URL")?;
        let header = authorization_header(
            "POST",
            &endpoint,
            Credentials {
                consumer_key: &self.consumer.key,
                consumer_secret: &self.consumer.secret,
                token: Some(&self.token.token),
                token_secret: Some(&self.token.token_secret),
            },
            &[],
            &[],
            &Nonce::fresh(),
        );
        self.http
            .request(Method::POST, endpoint)
            .header("Authorization", header)
            .json(&json!({ "text": text }))
            .build()
            .context("failed to build tweet request")
    }
}

#[async_trait]
impl SocialClient for TwitterClient {
    async fn post(&self, text: &str) -> anyhow::Result<String> {
        let request = self.build_request(text)?;
        debug!(url = %request.url(), chars = text.chars().count(), "sending tweet");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Twitter")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from Twitter: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Twitter rejected post");
            return Err(anyhow!("twitter error {}: {}", status, body));
        }

        let payload: CreateTweetResponse = res.json().await.context("invalid Twitter response")?;
        Ok(payload.data.id)
    }
}

/// Query parameters delivered to the OAuth callback endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: String,
    pub oauth_token: String,
    pub oauth_verifier: String,
}

impl CallbackParams {
    /// Extract parameters from the full redirect URL the browser landed on.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| PipelineError::AuthInvalid(format!("unparseable callback URL: {e}")))?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        if query.contains_key("denied") {
            return Err(PipelineError::AuthInvalid("authorization was denied".into()));
        }
        let field = |name: &str| {
            query
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| PipelineError::AuthInvalid(format!("callback is missing {name}")))
        };
        Ok(Self {
            state: field("state")?,
            oauth_token: field("oauth_token")?,
            oauth_verifier: field("oauth_verifier")?,
        })
    }
}

/// Result of starting the authorization flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub state: String,
    pub authorize_url: Url,
}

/// OAuth session provider: owns the request-token store and the stored
/// access token, and builds authenticated clients from it.
#[derive(Clone)]
pub struct TwitterSession {
    http: Client,
    base_url: Url,
    consumer: Consumer,
    callback_url: String,
    pool: Pool,
}

impl fmt::Debug for TwitterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterSession")
            .field("base_url", &self.base_url)
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}

impl TwitterSession {
    pub fn new(
        base_url: Url,
        consumer: Consumer,
        callback_url: String,
        pool: Pool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url,
            consumer,
            callback_url,
            pool,
        })
    }

    pub fn from_config(cfg: &Config, pool: Pool) -> anyhow::Result<Self> {
        let base = if cfg.twitter.api_base.trim().is_empty() {
            TWITTER_API_BASE
        } else {
            cfg.twitter.api_base.trim()
        };
        Self::new(
            Url::parse(base).context("invalid twitter.api_base")?,
            Consumer {
                key: cfg.twitter.api_key.clone(),
                secret: cfg.twitter.api_secret.clone(),
            },
            cfg.twitter.callback_url.clone(),
            pool,
        )
    }

    /// Callback URL carrying the correlation id, or `oob` for PIN-based flows.
    pub fn callback_for(&self, state: &str) -> String {
        match Url::parse(self.callback_url.trim()) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("state", state);
                url.to_string()
            }
            Err(_) => "oob".to_string(),
        }
    }

    pub fn authorize_url(&self, request_token: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join("oauth/authorize")
            .map_err(|e| PipelineError::AuthInvalid(format!("invalid Twitter base URL: {e}")))?;
        url.query_pairs_mut().append_pair("oauth_token", request_token);
        Ok(url)
    }

    /// Obtain a request token and remember it under a fresh correlation id.
    #[instrument(skip_all)]
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let callback = self.callback_for(&state);
        let form = self
            .signed_form_post("oauth/request_token", None, &[("oauth_callback", callback.as_str())])
            .await?;

        if form.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(PipelineError::AuthInvalid("callback was not confirmed".into()));
        }
        let token = required(&form, "oauth_token")?;
        let secret = required(&form, "oauth_token_secret")?;

        let purged = db::purge_expired_request_tokens(&self.pool, Utc::now()).await?;
        if purged > 0 {
            debug!(purged, "dropped expired request tokens");
        }
        let expires_at = Utc::now() + Duration::minutes(REQUEST_TOKEN_TTL_MINUTES);
        db::save_request_token(&self.pool, &state, &token, &secret, expires_at).await?;

        Ok(AuthorizationRequest {
            authorize_url: self.authorize_url(&token)?,
            state,
        })
    }

    /// Validate the callback against the issued request token and exchange
    /// it for a durable access token.
    #[instrument(skip_all)]
    pub async fn complete_authorization(&self, params: &CallbackParams) -> Result<AccessToken> {
        let request = self.claim_request_token(params).await?;
        let form = self
            .signed_form_post(
                "oauth/access_token",
                Some((request.token.as_str(), request.token_secret.as_str())),
                &[("oauth_verifier", params.oauth_verifier.as_str())],
            )
            .await?;

        let access = AccessToken {
            token: required(&form, "oauth_token")?,
            token_secret: required(&form, "oauth_token_secret")?,
            user_id: form.get("user_id").cloned(),
            screen_name: form.get("screen_name").cloned(),
        };
        db::set_option(&self.pool, ACCESS_TOKEN_OPTION, &serde_json::to_string(&access)?).await?;
        info!(screen_name = ?access.screen_name, "twitter access token stored");
        Ok(access)
    }

    /// Take the stored request token for `params.state`; any mismatch rejects the flow.
    pub async fn claim_request_token(&self, params: &CallbackParams) -> Result<RequestToken> {
        let Some(row) = db::take_request_token(&self.pool, &params.state).await? else {
            return Err(PipelineError::AuthInvalid(
                "no pending authorization for this callback".into(),
            ));
        };
        let request: RequestToken = row.into();
        if request.is_expired(Utc::now()) {
            return Err(PipelineError::AuthInvalid("authorization request expired".into()));
        }
        if request.token != params.oauth_token {
            return Err(PipelineError::AuthInvalid(
                "oauth_token does not match the issued request token".into(),
            ));
        }
        Ok(request)
    }

    pub async fn access_token(&self) -> Result<Option<AccessToken>> {
        match db::get_option(&self.pool, ACCESS_TOKEN_OPTION).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn forget_access_token(&self) -> Result<bool> {
        db::delete_option(&self.pool, ACCESS_TOKEN_OPTION).await
    }

    async fn signed_form_post(
        &self,
        path: &str,
        token: Option<(&str, &str)>,
        extra_oauth: &[(&str, &str)],
    ) -> Result<HashMap<String, String>> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| PipelineError::AuthInvalid(format!("invalid Twitter base URL: {e}")))?;
        let header = authorization_header(
            "POST",
            &endpoint,
            Credentials {
                consumer_key: &self.consumer.key,
                consumer_secret: &self.consumer.secret,
                token: token.map(|t| t.0),
                token_secret: token.map(|t| t.1),
            },
            extra_oauth,
            &[],
            &Nonce::fresh(),
        );
        let res = self
            .http
            .post(endpoint)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| PipelineError::AuthInvalid(format!("{path} request failed: {e}")))?;

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, path, "OAuth token endpoint rejected request");
            return Err(PipelineError::AuthInvalid(format!("{path} returned {status}: {body}")));
        }
        Ok(parse_form(&body))
    }
}

fn required(form: &HashMap<String, String>, key: &str) -> Result<String> {
    form.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| PipelineError::AuthInvalid(format!("token response is missing {key}")))
}

#[async_trait]
impl SessionProvider for TwitterSession {
    async fn client(&self) -> Result<Arc<dyn SocialClient>> {
        let Some(token) = self.access_token().await? else {
            return Err(PipelineError::AuthInvalid(
                "no Twitter access token stored; run the authorization flow first".into(),
            ));
        };
        let client = TwitterClient::new(self.base_url.clone(), self.consumer.clone(), token)
            .map_err(|e| PipelineError::AuthInvalid(format!("{e:#}")))?;
        Ok(Arc::new(client))
    }
}
