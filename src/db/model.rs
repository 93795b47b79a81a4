//! Row models used by repositories.
//!
//! Keep these focused on what queries return; behaviour lives higher up.

use chrono::{DateTime, Utc};

use crate::model::RequestToken;

/// Stored OAuth request token awaiting its callback.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestTokenRow {
    pub correlation_id: String,
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub expires_at: DateTime<Utc>,
}

impl From<RequestTokenRow> for RequestToken {
    fn from(row: RequestTokenRow) -> Self {
        RequestToken {
            token: row.oauth_token,
            token_secret: row.oauth_token_secret,
            expires_at: row.expires_at,
        }
    }
}
