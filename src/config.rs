//! Runtime configuration. Everything has a default so the config file is
//! optional; when present it lives next to the database inside the user's
//! home directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchoolError};
use crate::validation::ValidationRules;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".school-manager";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "school.db";
/// Optional TOML file read at startup.
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file. Falls back to `~/.school-manager/school.db`.
    pub db_path: Option<PathBuf>,
    /// How long SQLite itself waits on a locked database before reporting
    /// `SQLITE_BUSY`.
    pub busy_timeout_ms: u64,
    /// Pause before the facade's single retry of a busy operation.
    pub retry_delay_ms: u64,
    pub validation: ValidationRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: 250,
            retry_delay_ms: 200,
            validation: ValidationRules::default(),
        }
    }
}

impl AppConfig {
    /// Load `~/.school-manager/config.toml` if it exists, otherwise return the
    /// defaults. A malformed file is an error rather than silently ignored.
    pub fn load() -> Result<Self> {
        let path = data_dir()?.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| SchoolError::Config {
            message: format!("{}: {err}", path.display()),
        })
    }

    /// Config pointing at an explicit database file, everything else default.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Apply a command-line (or `SCHOOL_DB`) override on top of the file.
    pub fn with_db_override(mut self, db_path: Option<PathBuf>) -> Self {
        if db_path.is_some() {
            self.db_path = db_path;
        }
        self
    }

    /// The database file this configuration resolves to.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(DB_FILE_NAME)),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Resolve the application data directory inside the user's home.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| SchoolError::Config {
        message: "could not locate home directory".to_string(),
    })?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            db_path = "/tmp/school.db"
            retry_delay_ms = 50

            [validation]
            max_age = 99
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/school.db")));
        assert_eq!(config.retry_delay_ms, 50);
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.validation.max_age, 99);
        assert_eq!(config.validation.max_identifier_len, 32);
    }

    #[test]
    fn override_wins_over_file_value() {
        let config = AppConfig::for_path("/tmp/a.db")
            .with_db_override(Some(PathBuf::from("/tmp/b.db")));
        assert_eq!(config.resolve_db_path().unwrap(), PathBuf::from("/tmp/b.db"));

        let config = AppConfig::for_path("/tmp/a.db").with_db_override(None);
        assert_eq!(config.resolve_db_path().unwrap(), PathBuf::from("/tmp/a.db"));
    }
}
