//! Database module: row models and SQL repositories.
//!
//! - `model`: rows returned by repositories.
//! - `repo`: SQL-only functions (cursor, options, OAuth request tokens).
//!
//! Callers import from `review_autopost::db`; the repository API is
//! re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::RequestTokenRow;
