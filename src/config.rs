use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FxResult;
use crate::params::{self, MAX_THREADS, MIN_THREADS};

pub const JOIN_TIMEOUT_ENV: &str = "LENSFX_JOIN_TIMEOUT_MS";
pub const THREADS_ENV: &str = "LENSFX_THREADS";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Engine-wide settings that are not part of any effect's parameters.
pub struct EngineConfig {
    /// Upper bound on how long one stage may run; unbounded when unset.
    pub join_timeout_ms: Option<u64>,
    /// Worker count used when neither the effect nor the global setting
    /// chooses one.
    pub threads: Option<usize>,
}

impl EngineConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lensfx").join("config.toml"))
    }

    /// Loads the user config, falling back to defaults when there is no
    /// config directory or the file is missing or malformed.
    pub fn load() -> Self {
        Self::config_path().map_or_else(Self::default, |path| Self::load_from(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring malformed engine config");
            Self::default()
        })
    }

    /// Writes the config as TOML, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> FxResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// [`EngineConfig::load`] with process environment overrides applied.
    pub fn from_env() -> Self {
        Self::load().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `LENSFX_*` overrides read through `lookup`. Unparseable values
    /// are ignored; a timeout of `0` disables the timeout.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(JOIN_TIMEOUT_ENV) {
            if let Ok(ms) = raw.trim().parse::<u64>() {
                self.join_timeout_ms = (ms > 0).then_some(ms);
            }
        }
        if let Some(raw) = lookup(THREADS_ENV) {
            if let Ok(n) = raw.trim().parse::<usize>() {
                self.threads = Some(n);
            }
        }
        self
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }

    pub fn default_workers(&self) -> NonZeroUsize {
        match self.threads {
            Some(n) => NonZeroUsize::new(n.clamp(MIN_THREADS as usize, MAX_THREADS as usize))
                .unwrap_or(NonZeroUsize::MIN),
            None => params::default_threads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let base = EngineConfig {
            join_timeout_ms: Some(10),
            threads: Some(2),
        };
        let cfg = base.with_overrides(env(&[(JOIN_TIMEOUT_ENV, "2500"), (THREADS_ENV, " 12 ")]));
        assert_eq!(cfg.join_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(cfg.default_workers().get(), 12);
    }

    #[test]
    fn zero_timeout_disables_and_garbage_is_ignored() {
        let base = EngineConfig {
            join_timeout_ms: Some(10),
            threads: Some(3),
        };
        let cfg = base.with_overrides(env(&[(JOIN_TIMEOUT_ENV, "0"), (THREADS_ENV, "lots")]));
        assert_eq!(cfg.join_timeout(), None);
        assert_eq!(cfg.threads, Some(3));
    }

    #[test]
    fn worker_count_is_clamped() {
        let cfg = EngineConfig {
            join_timeout_ms: None,
            threads: Some(0),
        };
        assert_eq!(cfg.default_workers().get(), 1);
        let cfg = EngineConfig {
            join_timeout_ms: None,
            threads: Some(1000),
        };
        assert_eq!(cfg.default_workers().get(), 64);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("lensfx-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let cfg = EngineConfig {
            join_timeout_ms: Some(750),
            threads: Some(6),
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path), cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_or_malformed_file_loads_defaults() {
        let dir = std::env::temp_dir().join(format!("lensfx-bad-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "threads = \"many\"\n").unwrap();
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_from_toml() {
        let cfg: EngineConfig = toml::from_str("join_timeout_ms = 5000\nthreads = 8\n").unwrap();
        assert_eq!(cfg.join_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.threads, Some(8));
        let empty: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(empty, EngineConfig::default());
    }
}
