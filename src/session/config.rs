use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Session behaviour switches
///
/// Can be built in code or read from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Skip the store write when the encoded document equals the last one saved
    pub dirty_tracking: bool,

    /// Save store-bound referenced entities before their referrer
    pub cascade_saves: bool,

    /// Run every constraint before a save
    pub validate_on_save: bool,

    /// Prepended to every collection name
    pub collection_prefix: Option<String>,

    /// Pretty-print rendered documents
    pub pretty_render: bool,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            dirty_tracking: true,
            cascade_saves: true,
            validate_on_save: true,
            collection_prefix: None,
            pretty_render: false,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Enable or disable dirty tracking
    pub fn dirty_tracking(mut self, enabled: bool) -> Self {
        self.dirty_tracking = enabled;
        self
    }

    /// Enable or disable cascading saves of references
    pub fn cascade_saves(mut self, enabled: bool) -> Self {
        self.cascade_saves = enabled;
        self
    }

    /// Enable or disable validation before save
    pub fn validate_on_save(mut self, enabled: bool) -> Self {
        self.validate_on_save = enabled;
        self
    }

    /// Set the collection name prefix
    pub fn collection_prefix(mut self, prefix: &str) -> Self {
        self.collection_prefix = Some(prefix.to_string());
        self
    }

    pub fn pretty_render(mut self, enabled: bool) -> Self {
        self.pretty_render = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .dirty_tracking(false)
            .collection_prefix("app_");

        assert!(!config.dirty_tracking);
        assert!(config.cascade_saves);
        assert_eq!(config.collection_prefix.as_deref(), Some("app_"));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SessionConfig::from_json(r#"{ "pretty_render": true }"#).unwrap();
        assert!(config.pretty_render);
        assert!(config.dirty_tracking);
        assert!(config.validate_on_save);

        let round_trip = SessionConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let err = SessionConfig::from_json(r#"{ "dirty_tracking": "yes" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
