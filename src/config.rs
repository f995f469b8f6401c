//! Configuration manager for the user directory.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::USER_SEARCH_DEFAULT_LIMIT;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default)]
    pub name: String,
    /// `tracing` filter, e.g. `info` or `user_directory=debug`.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to SQL storage.
    #[serde(default)]
    pub database: Database,
    /// Related to the profile cache.
    #[serde(default)]
    pub cache: Cache,
    /// Related to user search.
    #[serde(default)]
    pub search: Search,
}

/// SQL storage configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Database {
    /// Connection URL, `sqlite://directory.db` or `sqlite::memory:`.
    pub url: String,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: crate::database::DEFAULT_URL.to_owned(),
            pool_size: None,
        }
    }
}

/// Profile cache configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cache {
    /// Lifetime of an entry.
    pub ttl_seconds: u64,
    /// Maximum entries per cache.
    pub capacity: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl_seconds: 15 * 60,
            capacity: 50_000,
        }
    }
}

/// Search configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Search {
    /// Result cap used when a search does not set one.
    pub default_limit: usize,
}

impl Default for Search {
    fn default() -> Self {
        Self {
            default_limit: USER_SEARCH_DEFAULT_LIMIT,
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        };

        match File::open(&file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => return Arc::new(self.error(err)),
                    };

                // set app version.
                config.version = VERSION.to_owned();
                config.path = file_path;

                if config.search.default_limit == 0 {
                    config.search.default_limit = USER_SEARCH_DEFAULT_LIMIT;
                }

                Arc::new(config)
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, path = ?self.path, "`config.yaml` file not readable");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: directory\ndatabase:\n  url: \"sqlite::memory:\"\n  pool_size: 4\ncache:\n  ttl_seconds: 60\n  capacity: 10\nsearch:\n  default_limit: 0"
        )
        .unwrap();

        let config = Configuration::default()
            .path(file.path().to_path_buf())
            .read();

        assert_eq!(config.name, "directory");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.pool_size, Some(4));
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.search.default_limit, USER_SEARCH_DEFAULT_LIMIT);
        assert_eq!(config.version(), VERSION);
    }

    #[test]
    fn test_fallback_on_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database: [not, a, map]").unwrap();

        let config = Configuration::default()
            .path(file.path().to_path_buf())
            .read();

        assert_eq!(config.database, Database::default());
        assert_eq!(config.cache, Cache::default());
        assert_eq!(config.version(), VERSION);
    }
}
