use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// A single upstream review. `id` is the ordering and dedup key; the full
/// JSON record is kept untouched for template substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    id: i64,
    record: Value,
}

impl Review {
    /// Build a review from one element of the upstream array. The element must
    /// be an object carrying an integer `id` (a numeric string is tolerated).
    pub fn from_value(record: Value) -> Result<Self> {
        let id = match record.get("id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(id) = id else {
            return Err(PipelineError::MalformedReview(format!(
                "review without integer id: {}",
                truncate_for_log(&record)
            )));
        };
        Ok(Self { id, record })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn record(&self) -> &Value {
        &self.record
    }
}

fn truncate_for_log(value: &Value) -> String {
    let s = value.to_string();
    if s.chars().count() > 120 {
        let head: String = s.chars().take(120).collect();
        format!("{head}...")
    } else {
        s
    }
}

/// One upstream response, in upstream order.
#[derive(Debug, Clone)]
pub struct ReviewBatch {
    pub reviews: Vec<Review>,
    pub fetched_at: DateTime<Utc>,
}

impl ReviewBatch {
    pub fn new(reviews: Vec<Review>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            reviews,
            fetched_at,
        }
    }

    /// Reviews newer than `cursor`, ascending by id, one per id.
    pub fn pending_after(&self, cursor: i64) -> Vec<&Review> {
        let mut pending: Vec<&Review> = self.reviews.iter().filter(|r| r.id() > cursor).collect();
        pending.sort_by_key(|r| r.id());
        pending.dedup_by_key(|r| r.id());
        pending
    }

    pub fn newest_id(&self) -> Option<i64> {
        self.reviews.iter().map(Review::id).max()
    }
}

/// Long-lived OAuth credential persisted after a completed authorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub token_secret: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
}

/// Temporary OAuth credential issued at the start of the authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub token_secret: String,
    pub expires_at: DateTime<Utc>,
}

impl RequestToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(ids: &[i64]) -> ReviewBatch {
        let reviews = ids
            .iter()
            .map(|id| Review::from_value(json!({ "id": id })).unwrap())
            .collect();
        ReviewBatch::new(reviews, Utc::now())
    }

    #[test]
    fn pending_after_filters_and_sorts() {
        let b = batch(&[3, 5, 6, 8, 7]);
        let ids: Vec<i64> = b.pending_after(5).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![6, 7, 8]);
        assert_eq!(b.newest_id(), Some(8));
    }

    #[test]
    fn pending_after_drops_repeated_ids() {
        let b = batch(&[6, 7, 6, 4, 7]);
        let ids: Vec<i64> = b.pending_after(0).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![4, 6, 7]);
        assert!(b.pending_after(7).is_empty());
    }

    #[test]
    fn review_requires_integer_id() {
        assert!(Review::from_value(json!({ "comment": "hi" })).is_err());
        assert!(Review::from_value(json!({ "id": 1.5 })).is_err());
        assert!(Review::from_value(json!([1, 2])).is_err());
        assert_eq!(Review::from_value(json!({ "id": "17" })).unwrap().id(), 17);
    }

    #[test]
    fn access_token_tolerates_missing_profile_fields() {
        let token: AccessToken =
            serde_json::from_str(r#"{"token":"t","token_secret":"s"}"#).unwrap();
        assert_eq!(token.token, "t");
        assert!(token.screen_name.is_none());
    }
}
