//! Tracker configuration.

use crate::dice::DiceLimits;
use std::path::PathBuf;

/// Most suggestions an autocomplete list returns.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 25;

/// Configuration for a tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Directory of ability definitions (`*.json`).
    pub abilities_dir: PathBuf,

    /// Directory of kit definitions (`*.json`).
    pub kits_dir: PathBuf,

    /// Where the file medium keeps tracker documents.
    pub storage_dir: PathBuf,

    /// Bounds for free-form dice expressions.
    pub dice_limits: DiceLimits,

    pub suggestion_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self {
            abilities_dir: PathBuf::from("abilities"),
            kits_dir: PathBuf::from("kits"),
            storage_dir: PathBuf::from("tracker_data"),
            dice_limits: DiceLimits::default(),
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }

    /// Defaults overridden by `STEEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `STEEL_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        if let Some(dir) = lookup("STEEL_ABILITIES_DIR") {
            config.abilities_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STEEL_KITS_DIR") {
            config.kits_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STEEL_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(max) = parse_number(&lookup, "STEEL_MAX_DICE") {
            config.dice_limits.max_count = max;
        }
        if let Some(max) = parse_number(&lookup, "STEEL_MAX_SIDES") {
            config.dice_limits.max_sides = max;
        }

        config
    }

    pub fn with_abilities_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.abilities_dir = dir.into();
        self
    }

    pub fn with_kits_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kits_dir = dir.into();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn with_dice_limits(mut self, limits: DiceLimits) -> Self {
        self.dice_limits = limits;
        self
    }

    pub fn with_suggestion_limit(mut self, limit: usize) -> Self {
        self.suggestion_limit = limit;
        self
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::new();
        assert_eq!(config.abilities_dir, PathBuf::from("abilities"));
        assert_eq!(config.dice_limits.max_count, 200);
        assert_eq!(config.dice_limits.max_sides, 1000);
        assert_eq!(config.suggestion_limit, 25);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STEEL_KITS_DIR", "/srv/kits"),
            ("STEEL_MAX_DICE", "50"),
            ("STEEL_MAX_SIDES", "many"),
        ]
        .into_iter()
        .collect();

        let config = TrackerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.kits_dir, PathBuf::from("/srv/kits"));
        assert_eq!(config.abilities_dir, PathBuf::from("abilities"));
        assert_eq!(config.dice_limits.max_count, 50);
        assert_eq!(config.dice_limits.max_sides, 1000);
    }

    #[test]
    fn test_builder() {
        let config = TrackerConfig::new()
            .with_storage_dir("/tmp/tracker")
            .with_suggestion_limit(10);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/tracker"));
        assert_eq!(config.suggestion_limit, 10);
    }
}
