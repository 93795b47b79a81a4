use super::model::RequestTokenRow;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
pub async fn memory_pool() -> anyhow::Result<Pool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // sqlx only creates missing database files when asked to.
    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_last_published_review_id(pool: &Pool) -> Result<i64> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT last_review_id FROM publish_cursor WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(id.unwrap_or(0))
}

/// Move the cursor forward to `review_id` if it is ahead of the stored value.
/// Returns whether the row changed.
#[instrument(skip_all)]
pub async fn advance_last_published_review_id(pool: &Pool, review_id: i64) -> Result<bool> {
    // 0 is the implicit starting value, even when the row is missing.
    if review_id <= 0 {
        return Ok(false);
    }
    let res = sqlx::query(
        "INSERT INTO publish_cursor (id, last_review_id, updated_at) VALUES (1, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(id) DO UPDATE SET last_review_id = excluded.last_review_id, updated_at = CURRENT_TIMESTAMP \
         WHERE publish_cursor.last_review_id < excluded.last_review_id",
    )
    .bind(review_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn get_option(pool: &Pool, name: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM options WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip_all)]
pub async fn set_option(pool: &Pool, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO options (name, value) VALUES (?, ?) \
         ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_option(pool: &Pool, name: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM options WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn save_request_token(
    pool: &Pool,
    correlation_id: &str,
    oauth_token: &str,
    oauth_token_secret: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO oauth_request_tokens (correlation_id, oauth_token, oauth_token_secret, expires_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(correlation_id)
    .bind(oauth_token)
    .bind(oauth_token_secret)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch and delete the request token for `correlation_id`. Tokens are single use.
#[instrument(skip_all)]
pub async fn take_request_token(pool: &Pool, correlation_id: &str) -> Result<Option<RequestTokenRow>> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, RequestTokenRow>(
        "SELECT correlation_id, oauth_token, oauth_token_secret, expires_at \
         FROM oauth_request_tokens WHERE correlation_id = ?",
    )
    .bind(correlation_id)
    .fetch_optional(&mut *tx)
    .await?;
    if row.is_some() {
        sqlx::query("DELETE FROM oauth_request_tokens WHERE correlation_id = ?")
            .bind(correlation_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(row)
}

#[instrument(skip_all)]
pub async fn purge_expired_request_tokens(pool: &Pool, now: DateTime<Utc>) -> Result<u64> {
    let res = sqlx::query("DELETE FROM oauth_request_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
