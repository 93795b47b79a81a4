//! Read surface for sectioned key/value settings.
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::config::parse_switch;

pub const GENERAL: &str = "general";
pub const TWITTER: &str = "twitter";

/// Typed accessor over string-keyed fields grouped by section.
pub trait SettingsStore: Send + Sync {
    fn get(&self, section: &str, field: &str) -> Option<String>;

    /// Checkbox-style flag; anything unset or unparseable reads as off.
    fn flag(&self, section: &str, field: &str) -> bool {
        self.get(section, field)
            .and_then(|v| parse_switch(&v))
            .unwrap_or(false)
    }

    /// Value with surrounding whitespace removed, `None` when empty.
    fn non_empty(&self, section: &str, field: &str) -> Option<String> {
        self.get(section, field)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Mutable in-process settings, handy when assembling a pipeline by hand.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<(String, String), String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, section: &str, field: &str, value: &str) -> Self {
        self.set(section, field, value);
        self
    }

    pub fn set(&self, section: &str, field: &str, value: &str) {
        if let Ok(mut guard) = self.values.write() {
            guard.insert((section.to_string(), field.to_string()), value.to_string());
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, section: &str, field: &str) -> Option<String> {
        self.values
            .read()
            .ok()?
            .get(&(section.to_string(), field.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults_off() {
        let s = MemorySettings::new().with(TWITTER, "enabled", "garbage");
        assert!(!s.flag(TWITTER, "enabled"));
        assert!(!s.flag(TWITTER, "missing"));
        s.set(TWITTER, "enabled", "on");
        assert!(s.flag(TWITTER, "enabled"));
    }

    #[test]
    fn non_empty_trims() {
        let s = MemorySettings::new()
            .with(GENERAL, "account_id", "  ")
            .with(TWITTER, "template", " {id} ");
        assert_eq!(s.non_empty(GENERAL, "account_id"), None);
        assert_eq!(s.non_empty(TWITTER, "template").as_deref(), Some("{id}"));
    }
}
