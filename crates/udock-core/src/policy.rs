#![forbid(unsafe_code)]

//! Policy-as-data configuration for the session runtime.
//!
//! Captures the autosave and scheduling tunables as a single
//! [`SessionPolicy`] that can be loaded from TOML or JSON at startup,
//! removing the need for compile-time constant changes.
//!
//! # Loading
//!
//! ```toml
//! # udock-policy.toml
//! restore_point_debounce_ms = 300
//! log_batch_window_ms = 500
//! ```
//!
//! ```rust,ignore
//! let policy = SessionPolicy::from_toml_file("udock-policy.toml")?;
//! ```
//!
//! # Defaults
//!
//! Every field has a default matching the shipped behavior, so
//! `SessionPolicy::default()` needs no file at all.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable parameters for one test session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Quiet window for restore-point coalescing, in milliseconds.
    pub restore_point_debounce_ms: u64,
    /// Quiet window for response coalescing, in milliseconds.
    ///
    /// Independent from the restore-point window even when equal.
    pub response_debounce_ms: u64,
    /// Fixed accumulation window for activity-log batching, in milliseconds.
    pub log_batch_window_ms: u64,
    /// Idle poll timeout for the driver loop when no autosave deadline is
    /// armed, in milliseconds.
    pub poll_timeout_ms: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            restore_point_debounce_ms: 300,
            response_debounce_ms: 300,
            log_batch_window_ms: 500,
            poll_timeout_ms: 100,
        }
    }
}

impl SessionPolicy {
    /// Restore-point quiet window as a [`Duration`].
    #[must_use]
    pub fn restore_point_debounce(&self) -> Duration {
        Duration::from_millis(self.restore_point_debounce_ms)
    }

    /// Response quiet window as a [`Duration`].
    #[must_use]
    pub fn response_debounce(&self) -> Duration {
        Duration::from_millis(self.response_debounce_ms)
    }

    /// Log batch window as a [`Duration`].
    #[must_use]
    pub fn log_batch_window(&self) -> Duration {
        Duration::from_millis(self.log_batch_window_ms)
    }

    /// Driver idle poll timeout as a [`Duration`].
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, PolicyError> {
        toml::from_str(s).map_err(PolicyError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PolicyError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(s).map_err(PolicyError::Json)
    }
}

/// Policy loading failure.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML policy: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON policy: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_behavior() {
        let p = SessionPolicy::default();
        assert_eq!(p.restore_point_debounce(), Duration::from_millis(300));
        assert_eq!(p.response_debounce(), Duration::from_millis(300));
        assert_eq!(p.log_batch_window(), Duration::from_millis(500));
        assert_eq!(p.poll_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let p = SessionPolicy::from_toml_str("restore_point_debounce_ms = 50\n").unwrap();
        assert_eq!(p.restore_point_debounce_ms, 50);
        assert_eq!(p.response_debounce_ms, 300);
        assert_eq!(p.log_batch_window_ms, 500);
    }

    #[test]
    fn json_round_trip() {
        let p = SessionPolicy {
            restore_point_debounce_ms: 10,
            response_debounce_ms: 20,
            log_batch_window_ms: 30,
            poll_timeout_ms: 40,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(SessionPolicy::from_json_str(&json).unwrap(), p);
    }

    #[test]
    fn invalid_toml_is_a_typed_error() {
        let err = SessionPolicy::from_toml_str("restore_point_debounce_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, PolicyError::Toml(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SessionPolicy::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PolicyError::Io(_)));
    }

    #[test]
    fn loads_policy_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("udock-policy.toml");
        std::fs::write(&path, "log_batch_window_ms = 750\n").unwrap();
        let p = SessionPolicy::from_toml_file(&path).unwrap();
        assert_eq!(p.log_batch_window_ms, 750);
        assert_eq!(p.restore_point_debounce_ms, 300);
    }
}
