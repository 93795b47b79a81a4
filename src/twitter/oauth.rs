//! OAuth 1.0a request signing (HMAC-SHA1).
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha1::Sha1;
use std::collections::HashMap;

/// Secrets used for one signed request.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
}

/// Per-request values that must never repeat.
#[derive(Debug, Clone)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl Nonce {
    pub fn fresh() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 percent-encoding, as OAuth requires.
pub fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn base_string_uri(url: &Url) -> String {
    let mut u = url.clone();
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

pub fn signature_base(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&base_string_uri(url)),
        encode(&joined)
    )
}

pub fn sign(base: &str, consumer_secret: &str, token_secret: Option<&str>) -> String {
    let key = format!(
        "{}&{}",
        encode(consumer_secret),
        encode(token_secret.unwrap_or(""))
    );
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Build the `Authorization: OAuth ...` header value.
///
/// `extra_oauth` carries protocol parameters such as `oauth_callback` or
/// `oauth_verifier`; `form_params` are url-encoded body fields (JSON bodies
/// are not signed). Query parameters are taken from `url`.
pub fn authorization_header(
    method: &str,
    url: &Url,
    creds: Credentials<'_>,
    extra_oauth: &[(&str, &str)],
    form_params: &[(&str, &str)],
    nonce: &Nonce,
) -> String {
    let mut oauth: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), creds.consumer_key.into()),
        ("oauth_nonce".into(), nonce.nonce.clone()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), nonce.timestamp.to_string()),
        ("oauth_version".into(), "1.0".into()),
    ];
    if let Some(token) = creds.token {
        oauth.push(("oauth_token".into(), token.into()));
    }
    oauth.extend(extra_oauth.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let mut all = oauth.clone();
    all.extend(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
    all.extend(form_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let base = signature_base(method, url, &all);
    oauth.push(("oauth_signature".into(), sign(&base, creds.consumer_secret, creds.token_secret)));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {fields}")
}

/// Parse an `application/x-www-form-urlencoded` response body.
pub fn parse_form(body: &str) -> HashMap<String, String> {
    body.trim()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let plus_as_space = s.replace('+', " ");
    urlencoding::decode(&plus_as_space)
        .map(|c| c.into_owned())
        .unwrap_or(plus_as_space)
}
