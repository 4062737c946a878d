//! Database configuration.
use std::path::PathBuf;

use anyhow::Result;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding `database.sqlite`.  `None` means an in-memory database, which is what the tests use.
    pub path: Option<PathBuf>,

    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout_ms: u32,

    /// SQLite's page cache size.  The default sqlite picks for us is a couple megabytes, sized for phones.
    pub cache_size_kib: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            busy_timeout_ms: 1000,
            cache_size_kib: 100_000,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Default::default()
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = DatabaseConfig::from_json(r#"{ "path": "/var/lib/orgsync" }"#).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/var/lib/orgsync")));
        assert_eq!(config.busy_timeout_ms, 1000);
        assert_eq!(config.cache_size_kib, 100_000);
    }

    #[test]
    fn empty_json_is_in_memory() {
        assert_eq!(
            DatabaseConfig::from_json("{}").unwrap(),
            DatabaseConfig::in_memory()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(DatabaseConfig::from_json(r#"{ "busy_timeout_ms": "soon" }"#).is_err());
    }
}
