use std::path::{Path, PathBuf};
use std::time::Duration;

use storage::sqlite::SqliteConfig;
use thiserror::Error;

const DEFAULT_DB_URL: &str = "sqlite://lang_portal.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid database url: {raw:?}")]
    InvalidDbUrl { raw: String },

    #[error("{var} must be a positive integer (got {raw:?})")]
    InvalidNumber { var: &'static str, raw: String },

    #[error("could not prepare database file {path}: {source}")]
    PrepareFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime settings for the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl AppConfig {
    /// Read the process environment. `db_override` comes from `--db` and wins
    /// over `PORTAL_DB_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a blank URL or a non-numeric pool setting.
    pub fn load(db_override: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), db_override)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        db_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw_url = db_override
            .or_else(|| lookup("PORTAL_DB_URL"))
            .unwrap_or_else(|| DEFAULT_DB_URL.to_owned());
        if raw_url.trim().is_empty() {
            return Err(ConfigError::InvalidDbUrl { raw: raw_url });
        }

        let max_connections = match lookup("PORTAL_DB_MAX_CONNECTIONS") {
            Some(raw) => parse_positive("PORTAL_DB_MAX_CONNECTIONS", &raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let acquire_secs = match lookup("PORTAL_DB_ACQUIRE_TIMEOUT_SECS") {
            Some(raw) => u64::from(parse_positive("PORTAL_DB_ACQUIRE_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_ACQUIRE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url: normalize_sqlite_url(&raw_url),
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_secs),
        })
    }

    #[must_use]
    pub fn sqlite(&self) -> SqliteConfig {
        let mut config = SqliteConfig::new(self.database_url.clone());
        // Each connection to `sqlite::memory:` opens a separate database.
        config.max_connections = if self.database_url == MEMORY_URL {
            1
        } else {
            self.max_connections
        };
        config.acquire_timeout = self.acquire_timeout;
        config
    }

    /// Create the database file and its parent directory if they are missing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL has no path or the file cannot be created.
    pub fn prepare_sqlite_file(&self) -> Result<(), ConfigError> {
        if self.database_url == MEMORY_URL {
            return Ok(());
        }

        let path = self
            .database_url
            .strip_prefix("sqlite://")
            .ok_or_else(|| ConfigError::InvalidDbUrl {
                raw: self.database_url.clone(),
            })?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() {
            return Err(ConfigError::InvalidDbUrl {
                raw: self.database_url.clone(),
            });
        }

        let path = Path::new(path);
        let prepare_err = |source| ConfigError::PrepareFile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(prepare_err)?;
        }
        if !path.exists() {
            std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(prepare_err)?;
        }
        Ok(())
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            raw: raw.to_owned(),
        }),
    }
}

/// Turn bare or relative paths into absolute `sqlite://` URLs.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == MEMORY_URL || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[]), None).unwrap();
        assert_eq!(config.database_url, DEFAULT_DB_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn cli_override_beats_environment() {
        let config = AppConfig::from_lookup(
            lookup(&[("PORTAL_DB_URL", "sqlite:///tmp/env.db")]),
            Some("sqlite::memory:".into()),
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("data/portal.db");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/portal.db"));
        assert_eq!(normalize_sqlite_url("sqlite:/srv/p.db"), "sqlite:///srv/p.db");
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("PORTAL_DB_MAX_CONNECTIONS", "0")]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { var: "PORTAL_DB_MAX_CONNECTIONS", .. }
        ));
    }

    #[test]
    fn pool_settings_flow_into_sqlite_config() {
        let config = AppConfig::from_lookup(
            lookup(&[
                ("PORTAL_DB_MAX_CONNECTIONS", "3"),
                ("PORTAL_DB_ACQUIRE_TIMEOUT_SECS", "9"),
            ]),
            Some("sqlite:///tmp/portal.db".into()),
        )
        .unwrap();
        let sqlite = config.sqlite();
        assert_eq!(sqlite.max_connections, 3);
        assert_eq!(sqlite.acquire_timeout, Duration::from_secs(9));
    }
}
