//! Configuration loader and validator for the review auto-poster.
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::settings::SettingsStore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub general: General,
    pub twitter: Twitter,
}

/// Behaviour on the very first run, when nothing has been published yet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FirstRun {
    /// Publish every review already present upstream.
    #[default]
    Backfill,
    /// Remember the newest id without publishing anything.
    Skip,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_interval")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub first_run: FirstRun,
}

/// Upstream review source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct General {
    #[serde(default, deserialize_with = "string_ish")]
    pub account_id: String,
    #[serde(default = "default_codeable_base")]
    pub api_base: String,
}

/// Twitter destination settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Twitter {
    #[serde(default, deserialize_with = "bool_ish")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub template: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_twitter_base")]
    pub api_base: String,
}

fn default_interval() -> u64 {
    30 * 60
}

fn default_max_length() -> usize {
    280
}

fn default_codeable_base() -> String {
    "https://api.codeable.io/".into()
}

fn default_twitter_base() -> String {
    "https://api.twitter.com/".into()
}

/// Accepts YAML booleans as well as the checkbox-style strings `on`/`off`.
fn bool_ish<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Str(s) => parse_switch(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("expected on/off, got {:?}", s))
        }),
    }
}

/// Accepts ids written either quoted or as bare YAML integers.
fn string_ish<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(i) => i.to_string(),
        Raw::Str(s) => s,
    })
}

/// Parse a checkbox-style switch value.
pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.resolved_data_dir())
    }

    /// `app.data_dir` with a leading `~/` expanded.
    pub fn resolved_data_dir(&self) -> String {
        let dir = self.app.data_dir.trim();
        match (dir.strip_prefix("~/"), std::env::var("HOME")) {
            (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
            _ => dir.to_string(),
        }
    }

    /// Database URL, honouring a `DATABASE_URL` override.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/autopost.db", self.resolved_data_dir()))
    }
}

impl SettingsStore for Config {
    fn get(&self, section: &str, field: &str) -> Option<String> {
        let value = match (section, field) {
            ("general", "account_id") => self.general.account_id.clone(),
            ("general", "api_base") => self.general.api_base.clone(),
            ("twitter", "enabled") => (if self.twitter.enabled { "on" } else { "off" }).to_string(),
            ("twitter", "api_key") => self.twitter.api_key.clone(),
            ("twitter", "api_secret") => self.twitter.api_secret.clone(),
            ("twitter", "callback_url") => self.twitter.callback_url.clone(),
            ("twitter", "template") => self.twitter.template.clone(),
            ("twitter", "max_length") => self.twitter.max_length.to_string(),
            ("twitter", "api_base") => self.twitter.api_base.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_secs must be > 0"));
    }
    if reqwest::Url::parse(&cfg.general.api_base).is_err() {
        return Err(ConfigError::Invalid("general.api_base must be a valid URL"));
    }
    if reqwest::Url::parse(&cfg.twitter.api_base).is_err() {
        return Err(ConfigError::Invalid("twitter.api_base must be a valid URL"));
    }
    // account_id may stay empty: runs are then a no-op.

    if cfg.twitter.enabled {
        if cfg.twitter.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("twitter.api_key must be non-empty"));
        }
        if cfg.twitter.api_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("twitter.api_secret must be non-empty"));
        }
        if cfg.twitter.template.trim().is_empty() {
            return Err(ConfigError::Invalid("twitter.template must be non-empty"));
        }
        if cfg.twitter.max_length == 0 {
            return Err(ConfigError::Invalid("twitter.max_length must be > 0"));
        }
    }

    Ok(())
}

/// Returns a complete example YAML document.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  poll_interval_secs: 1800
  cache_ttl_secs: 1800
  first_run: backfill

general:
  account_id: "12345"
  api_base: "https://api.codeable.io/"

twitter:
  enabled: "on"
  api_key: "YOUR_TWITTER_API_KEY"
  api_secret: "YOUR_TWITTER_API_SECRET"
  callback_url: "http://localhost:8080/twitter/callback"
  template: "{reviewer.full_name} rated {score}/5 for \"{task_title}\": {comment}"
  max_length: 280
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert!(cfg.twitter.enabled);
        assert_eq!(cfg.app.first_run, FirstRun::Backfill);
        assert_eq!(cfg.twitter.api_base, "https://api.twitter.com/");
    }

    #[test]
    fn switch_values() {
        for (raw, expected) in [("on", true), ("OFF", false), ("yes", true), ("0", false)] {
            assert_eq!(parse_switch(raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_switch("maybe"), None);

        let yaml = example().replace("enabled: \"on\"", "enabled: false");
        let cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(!cfg.twitter.enabled);

        let yaml = example().replace("enabled: \"on\"", "enabled: \"sometimes\"");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn invalid_poll_interval() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.poll_interval_secs = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("poll_interval_secs")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn twitter_credentials_required_only_when_enabled() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.twitter.api_secret = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("twitter.api_secret")),
            _ => panic!("wrong error"),
        }

        cfg.twitter.enabled = false;
        validate(&cfg).unwrap();
    }

    #[test]
    fn empty_account_id_is_valid() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.general.account_id = "".into();
        validate(&cfg).unwrap();
        assert_eq!(cfg.get("general", "account_id").as_deref(), Some(""));
    }

    #[test]
    fn bare_integer_account_id() {
        let yaml = example().replace("account_id: \"12345\"", "account_id: 12345");
        assert!(yaml.contains("account_id: 12345\n"));
        let cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.general.account_id, "12345");
        assert_eq!(cfg.get("general", "account_id").as_deref(), Some("12345"));

        let yaml = example().replace("account_id: \"12345\"", "account_id: [1]");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn settings_surface() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        assert!(cfg.flag("twitter", "enabled"));
        assert_eq!(cfg.get("general", "account_id").as_deref(), Some("12345"));
        assert!(cfg.get("twitter", "nope").is_none());
        assert!(cfg.get("facebook", "enabled").is_none());
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.general.account_id, "12345");
        assert_eq!(cfg.twitter.max_length, 280);
    }
}
