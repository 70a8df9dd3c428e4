//! Tunables for both engines, stored as `config.json` in the data directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{default_data_dir, DB_FILE};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisciplineConfig {
    /// Grace window between reserving a seat and starting, in minutes.
    pub reservation_minutes: u32,
    /// Planned length of a focus session, in minutes.
    pub session_minutes: u32,
    /// Quota-consuming tree mutations allowed per calendar day.
    pub daily_limit: u32,
    /// Database location. Defaults to `discipline.db` in the data directory.
    pub db_path: Option<PathBuf>,
}

impl Default for DisciplineConfig {
    fn default() -> Self {
        Self {
            reservation_minutes: 15,
            session_minutes: 60,
            daily_limit: 1,
            db_path: None,
        }
    }
}

impl DisciplineConfig {
    /// Load configuration from `path`.
    /// Returns the default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Load from the default location in the user's data directory.
    pub fn load_default() -> Result<Self> {
        Self::load(&default_config_path()?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.reservation_minutes == 0 {
            anyhow::bail!("reservation_minutes must be > 0");
        }
        if self.session_minutes == 0 {
            anyhow::bail!("session_minutes must be > 0");
        }
        if self.daily_limit == 0 {
            anyhow::bail!("daily_limit must be > 0");
        }
        Ok(())
    }

    pub fn reservation_ms(&self) -> i64 {
        i64::from(self.reservation_minutes) * 60_000
    }

    pub fn session_ms(&self) -> i64 {
        i64::from(self.session_minutes) * 60_000
    }

    /// Resolved database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(default_data_dir()?.join(DB_FILE)),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = DisciplineConfig::load(&temp.path().join("missing.json")).expect("load");
        assert_eq!(cfg, DisciplineConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("conf").join(CONFIG_FILE);
        let cfg = DisciplineConfig {
            reservation_minutes: 10,
            db_path: Some(temp.path().join("x.db")),
            ..DisciplineConfig::default()
        };
        cfg.save(&path).expect("save");
        assert_eq!(DisciplineConfig::load(&path).expect("load"), cfg);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"daily_limit": 2}"#).unwrap();
        let cfg = DisciplineConfig::load(&path).expect("load");
        assert_eq!(cfg.daily_limit, 2);
        assert_eq!(cfg.reservation_minutes, 15);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"daily_limit": 0}"#).unwrap();
        let err = DisciplineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("daily_limit"));
    }

    #[test]
    fn durations_convert_to_ms() {
        let cfg = DisciplineConfig::default();
        assert_eq!(cfg.reservation_ms(), 15 * 60_000);
        assert_eq!(cfg.session_ms(), 60 * 60_000);
    }
}
