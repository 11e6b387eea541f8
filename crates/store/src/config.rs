//! Storage configuration
//!
//! The backend is a startup decision, loadable from a JSON file or built
//! from CLI flags. Once constructed, the same store instance is passed
//! through the whole process and closed at shutdown; no global handles.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which storage backend to run against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Volatile in-process store; state is lost on exit
    Memory,
    /// Durable SQLite database at `path`
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: PathBuf::from("./data/demobank.db"),
        }
    }
}

impl StorageConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sqlite() {
        assert_eq!(
            StorageConfig::default(),
            StorageConfig::Sqlite {
                path: PathBuf::from("./data/demobank.db")
            }
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = StorageConfig::Sqlite {
            path: PathBuf::from("/tmp/bank.db"),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("sqlite"));

        let parsed: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_memory_config_json() {
        let parsed: StorageConfig = serde_json::from_str(r#"{ "backend": "memory" }"#).unwrap();
        assert_eq!(parsed, StorageConfig::Memory);
    }
}
