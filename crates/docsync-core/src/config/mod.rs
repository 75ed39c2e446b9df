//! Runtime configuration for the sync and collaboration services.
//!
//! A `CoreConfig` is usually built from defaults; clients that ship a JSON
//! config file load it through [`CoreConfig::from_json`], which validates it.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sessions idle longer than this are left out of presence listings.
pub const DEFAULT_LIVENESS_WINDOW_SECS: u64 = 5 * 60;

/// Buffered events per subscriber before slow receivers start lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Collaborator colors, assigned in order.
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Presence liveness window in seconds
    pub liveness_window_secs: u64,
    /// Ordered collaborator palette (`#RRGGBB`)
    pub palette: Vec<String>,
    /// Per-document cap on queued changes; `None` means unbounded
    pub max_queued_changes: Option<usize>,
    /// Capacity of the outbound event channel
    pub event_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            liveness_window_secs: DEFAULT_LIVENESS_WINDOW_SECS,
            palette: DEFAULT_PALETTE.iter().map(ToString::to_string).collect(),
            max_queued_changes: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON config payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the presence liveness window
    #[must_use]
    pub const fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window_secs = window.as_secs();
        self
    }

    /// Cap queued changes per document
    #[must_use]
    pub const fn with_max_queued_changes(mut self, limit: usize) -> Self {
        self.max_queued_changes = Some(limit);
        self
    }

    #[must_use]
    pub fn with_palette<I, S>(mut self, palette: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.palette = palette.into_iter().map(Into::into).collect();
        self
    }

    pub const fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    /// Liveness window in milliseconds, saturating at `i64::MAX`
    pub fn liveness_window_millis(&self) -> i64 {
        i64::try_from(self.liveness_window().as_millis()).unwrap_or(i64::MAX)
    }

    /// Check invariants the services rely on.
    pub fn validate(&self) -> Result<()> {
        if self.liveness_window_secs == 0 {
            return Err(Error::Config(
                "liveness_window_secs must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_queued_changes == Some(0) {
            return Err(Error::Config(
                "max_queued_changes must be greater than zero when set".to_string(),
            ));
        }
        validate_palette(&self.palette)
    }
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("Invalid regex"))
}

fn validate_palette(palette: &[String]) -> Result<()> {
    if palette.is_empty() {
        return Err(Error::Config("palette must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for color in palette {
        if !color_pattern().is_match(color) {
            return Err(Error::Config(format!(
                "palette color '{color}' must look like #RRGGBB"
            )));
        }
        if !seen.insert(color.to_ascii_uppercase()) {
            return Err(Error::Config(format!(
                "palette color '{color}' is listed twice"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.liveness_window(), Duration::from_secs(300));
        assert_eq!(config.liveness_window_millis(), 300_000);
        assert_eq!(config.palette.len(), 8);
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = CoreConfig::from_json(r#"{ "max_queued_changes": 50 }"#).unwrap();
        assert_eq!(config.max_queued_changes, Some(50));
        assert_eq!(config.liveness_window_secs, DEFAULT_LIVENESS_WINDOW_SECS);
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let error = CoreConfig::from_json(r#"{ "palete": [] }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn palette_must_be_hex_and_distinct() {
        let bad_format = CoreConfig::default().with_palette(["red"]);
        assert!(bad_format.validate().is_err());

        let duplicate = CoreConfig::default().with_palette(["#aabbcc", "#AABBCC"]);
        let error = duplicate.validate().unwrap_err();
        assert!(error.to_string().contains("listed twice"));

        let empty = CoreConfig::default().with_palette(Vec::<String>::new());
        assert!(empty.validate().is_err());
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(CoreConfig::default()
            .with_max_queued_changes(0)
            .validate()
            .is_err());
        assert!(CoreConfig::default()
            .with_liveness_window(Duration::ZERO)
            .validate()
            .is_err());
    }
}
