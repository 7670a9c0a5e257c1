//! Engine settings: where files live and how fast the engine samples.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional `belltower.toml` in the install directory, then `BELLTOWER_*`
//! environment variables. They are read once at startup; only the schedule
//! itself is hot-reloaded.

use crate::error::{BellError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "belltower.toml";
pub const CONFIG_FILE: &str = "config.json";
pub const LOCK_FILE: &str = "belltower.lock";

const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 20;
const DEFAULT_ERROR_BACKOFF_SECS: u64 = 60;
const DEFAULT_LOG_FILTER: &str = "info";

/// Comparisons happen at minute resolution, so sampling must be finer than that.
const COMPARISON_GRANULARITY_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Directory relative clip paths and default file locations resolve against.
    pub install_dir: PathBuf,
    /// Schedule config file. Defaults to `config.json` in `install_dir`.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Lock record. Defaults to `belltower.lock` in `install_dir`.
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
    pub sample_interval_secs: u64,
    pub error_backoff_secs: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl EngineSettings {
    /// Loads settings for an engine installed next to the running executable.
    pub fn load() -> Result<Self> {
        Self::load_from(&install_dir()?)
    }

    /// The built-in settings for an engine installed in `install_dir`.
    pub fn defaults(install_dir: &Path) -> Self {
        Self {
            install_dir: install_dir.to_path_buf(),
            config_path: None,
            lock_path: None,
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    /// Like `load_from`, but an unreadable or invalid settings layer yields the
    /// defaults instead. The rejected error is handed back so the caller can
    /// report it once logging is up.
    pub fn load_or_defaults(install_dir: &Path) -> (Self, Option<BellError>) {
        match Self::load_from(install_dir) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::defaults(install_dir), Some(e)),
        }
    }

    pub fn load_from(install_dir: &Path) -> Result<Self> {
        let settings: EngineSettings = Config::builder()
            .set_default("install_dir", install_dir.to_string_lossy().into_owned())
            .and_then(|b| b.set_default("sample_interval_secs", DEFAULT_SAMPLE_INTERVAL_SECS as i64))
            .and_then(|b| b.set_default("error_backoff_secs", DEFAULT_ERROR_BACKOFF_SECS as i64))
            .and_then(|b| b.set_default("log_filter", DEFAULT_LOG_FILTER))
            .map_err(|e| BellError::Settings(e.to_string()))?
            .add_source(File::from(install_dir.join(SETTINGS_FILE)).required(false))
            .add_source(Environment::with_prefix("BELLTOWER"))
            .build()
            .and_then(|c| c.try_deserialize::<EngineSettings>())
            .map_err(|e| BellError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0
            || self.sample_interval_secs >= COMPARISON_GRANULARITY_SECS
        {
            return Err(BellError::Settings(format!(
                "sample_interval_secs must be between 1 and {}, got {}",
                COMPARISON_GRANULARITY_SECS - 1,
                self.sample_interval_secs
            )));
        }
        if self.error_backoff_secs == 0 {
            return Err(BellError::Settings(
                "error_backoff_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.install_dir.join(CONFIG_FILE))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.lock_path
            .clone()
            .unwrap_or_else(|| self.install_dir.join(LOCK_FILE))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// The directory holding the running executable.
pub fn install_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| BellError::Settings(format!("{} has no parent directory", exe.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_into_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EngineSettings::load_from(dir.path()).unwrap();
        assert_eq!(settings.sample_interval(), Duration::from_secs(20));
        assert_eq!(settings.error_backoff(), Duration::from_secs(60));
        assert_eq!(settings.config_path(), dir.path().join("config.json"));
        assert_eq!(settings.lock_path(), dir.path().join("belltower.lock"));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "sample_interval_secs = 15\nconfig_path = \"/etc/belltower/schedule.json\"\n",
        )
        .unwrap();
        let settings = EngineSettings::load_from(dir.path()).unwrap();
        assert_eq!(settings.sample_interval_secs, 15);
        assert_eq!(
            settings.config_path(),
            PathBuf::from("/etc/belltower/schedule.json")
        );
    }

    #[test]
    fn rejects_interval_not_finer_than_a_minute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "sample_interval_secs = 60\n").unwrap();
        assert!(matches!(
            EngineSettings::load_from(dir.path()),
            Err(BellError::Settings(_))
        ));
    }

    #[test]
    fn malformed_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "log_filter = \"debug\n").unwrap();

        let (settings, rejected) = EngineSettings::load_or_defaults(dir.path());
        assert!(matches!(rejected, Some(BellError::Settings(_))));
        assert_eq!(settings.sample_interval(), Duration::from_secs(20));
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.config_path(), dir.path().join("config.json"));
    }

    #[test]
    fn out_of_range_interval_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "sample_interval_secs = 60\n").unwrap();

        let (settings, rejected) = EngineSettings::load_or_defaults(dir.path());
        assert!(rejected.is_some());
        assert_eq!(settings.sample_interval_secs, 20);
    }

    #[test]
    fn valid_settings_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "error_backoff_secs = 5\n").unwrap();

        let (settings, rejected) = EngineSettings::load_or_defaults(dir.path());
        assert!(rejected.is_none());
        assert_eq!(settings.error_backoff(), Duration::from_secs(5));
    }
}
