//! Store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`DocumentStore`](crate::DocumentStore).
///
/// Every field defaults to `false`, which gives the plain behavior: one
/// direct overwrite per write, no `fsync`, compact JSON. Missing fields
/// take their defaults when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Write to a temporary sibling file and rename it over the document,
    /// so a crash mid-write never leaves a truncated document behind.
    pub atomic_writes: bool,

    /// `fsync` written data before the write is reported complete. With
    /// `atomic_writes` the parent directory is synced after the rename too
    /// (on Unix).
    pub sync_writes: bool,

    /// Encode structured documents with indentation.
    pub pretty_json: bool,
}

impl StoreConfig {
    pub fn with_atomic_writes(mut self, enabled: bool) -> Self {
        self.atomic_writes = enabled;
        self
    }

    pub fn with_sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    pub fn with_pretty_json(mut self, enabled: bool) -> Self {
        self.pretty_json = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_plain_writes() {
        let config = StoreConfig::default();
        assert!(!config.atomic_writes);
        assert!(!config.sync_writes);
        assert!(!config.pretty_json);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"atomic_writes": true}"#).unwrap();
        assert_eq!(config, StoreConfig::default().with_atomic_writes(true));
    }

    #[test]
    fn builders_set_fields() {
        let config = StoreConfig::default()
            .with_sync_writes(true)
            .with_pretty_json(true);
        assert!(config.sync_writes);
        assert!(config.pretty_json);
        assert!(!config.atomic_writes);
    }
}
