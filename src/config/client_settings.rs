//! User-adjustable client settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Timeouts and batching knobs for talking to the tool server.
///
/// Persisted to `client_settings.json` in the app data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Overrides the URL derived from `config.json`.
    pub mcp_url: Option<String>,
    pub call_timeout_ms: u64,
    pub query_timeout_ms: u64,
    pub save_timeout_ms: u64,
    /// Tables fetched concurrently per batch.
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    /// Rows requested per table by the full fetch.
    pub fetch_limit: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            mcp_url: None,
            call_timeout_ms: 10_000,
            query_timeout_ms: 30_000,
            save_timeout_ms: 20_000,
            batch_size: 4,
            batch_delay_ms: 500,
            fetch_limit: 100,
        }
    }
}

/// Shortest timeout honored for any tool call.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

impl ClientSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.max(MIN_TIMEOUT_MS))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(MIN_TIMEOUT_MS))
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms.max(MIN_TIMEOUT_MS))
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Batch size, never zero.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Rows per table for the full fetch, never zero.
    pub fn effective_fetch_limit(&self) -> u32 {
        self.fetch_limit.max(1)
    }

    /// The same settings with every knob raised to its minimum.
    pub fn normalized(mut self) -> Self {
        self.call_timeout_ms = self.call_timeout_ms.max(MIN_TIMEOUT_MS);
        self.query_timeout_ms = self.query_timeout_ms.max(MIN_TIMEOUT_MS);
        self.save_timeout_ms = self.save_timeout_ms.max(MIN_TIMEOUT_MS);
        self.batch_size = self.effective_batch_size();
        self.fetch_limit = self.effective_fetch_limit();
        self
    }

    /// Load from the data directory or return defaults.
    pub fn load_or_default() -> Self {
        Self::load_from(&Self::persist_path())
    }

    /// Load from `path`, falling back to defaults on any problem.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "loaded client settings");
                    settings.normalized()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse client settings, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to read client settings, using defaults");
                Self::default()
            }
        }
    }

    /// Save to the data directory, logging failures.
    pub fn save(&self) {
        let path = Self::persist_path();
        if let Err(e) = self.save_to(&path) {
            tracing::error!(error = %e, "failed to save client settings");
        }
    }

    /// Atomic write: temp file then rename.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content).map_err(|e| ConfigError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| ConfigError::io(path, e))?;
        tracing::debug!(path = %path.display(), "saved client settings");
        Ok(())
    }

    fn persist_path() -> PathBuf {
        crate::data_dir().join("client_settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = ClientSettings::default();
        assert_eq!(s.call_timeout(), Duration::from_secs(10));
        assert_eq!(s.query_timeout(), Duration::from_secs(30));
        assert_eq!(s.save_timeout(), Duration::from_secs(20));
        assert_eq!(s.batch_size, 4);
        assert_eq!(s.batch_delay(), Duration::from_millis(500));
        assert_eq!(s.fetch_limit, 100);
        assert!(s.mcp_url.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client_settings.json");

        let settings = ClientSettings {
            mcp_url: Some("http://127.0.0.1:9000/sse".into()),
            batch_size: 2,
            ..ClientSettings::default()
        };
        settings.save_to(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(ClientSettings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_settings.json");
        assert_eq!(ClientSettings::load_from(&path), ClientSettings::default());

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(ClientSettings::load_from(&path), ClientSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_settings.json");
        std::fs::write(&path, r#"{"queryTimeoutMs": 5000}"#).unwrap();

        let s = ClientSettings::load_from(&path);
        assert_eq!(s.query_timeout_ms, 5000);
        assert_eq!(s.call_timeout_ms, 10_000);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let s = ClientSettings {
            batch_size: 0,
            ..ClientSettings::default()
        };
        assert_eq!(s.effective_batch_size(), 1);
    }

    #[test]
    fn test_zero_timeouts_and_limit_are_clamped() {
        let s = ClientSettings {
            call_timeout_ms: 0,
            query_timeout_ms: 0,
            save_timeout_ms: 10,
            fetch_limit: 0,
            ..ClientSettings::default()
        };
        assert_eq!(s.call_timeout(), Duration::from_millis(MIN_TIMEOUT_MS));
        assert_eq!(s.query_timeout(), Duration::from_millis(MIN_TIMEOUT_MS));
        assert_eq!(s.save_timeout(), Duration::from_millis(MIN_TIMEOUT_MS));
        assert_eq!(s.effective_fetch_limit(), 1);

        let n = s.normalized();
        assert_eq!(n.call_timeout_ms, MIN_TIMEOUT_MS);
        assert_eq!(n.save_timeout_ms, MIN_TIMEOUT_MS);
        assert_eq!(n.fetch_limit, 1);
        assert_eq!(n.batch_size, 4);
        assert_eq!(ClientSettings::default().normalized(), ClientSettings::default());
    }
}
