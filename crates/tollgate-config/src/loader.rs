use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use tollgate_core::GateError;

use crate::schema::{GateConfig, WarningSeverity};

/// Loads and reloads the Tollgate configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<GateConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > TOLLGATE_CONFIG env > ~/.tollgate/tollgate.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("TOLLGATE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tollgate")
            .join("tollgate.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> tollgate_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = Self::read(&config_path)?;

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    match w.severity {
                        WarningSeverity::Info => debug!("{}", w),
                        _ => warn!("{}", w),
                    }
                }
            }
            Err(e) => {
                return Err(GateError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    fn read(config_path: &Path) -> tollgate_core::Result<GateConfig> {
        let mut config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(config_path)?;
            Self::parse(&raw, config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            GateConfig::default()
        };

        config = Self::apply_env_overrides(config);
        config.resolve_paths(Self::config_dir_of(config_path));
        Ok(config)
    }

    fn parse(raw: &str, config_path: &Path) -> tollgate_core::Result<GateConfig> {
        toml::from_str::<GateConfig>(raw).map_err(|e| {
            GateError::Config(format!("failed to parse {}: {}", config_path.display(), e))
        })
    }

    fn config_dir_of(config_path: &Path) -> &Path {
        match config_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> GateConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<GateConfig>> {
        Arc::clone(&self.config)
    }

    /// Path the config was (or would have been) loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Directory relative paths in the config are resolved against.
    pub fn config_dir(&self) -> &Path {
        Self::config_dir_of(&self.config_path)
    }

    /// Apply env var overrides (TOLLGATE_LOG_LEVEL, TOLLGATE_LEDGER_DB, etc.)
    fn apply_env_overrides(mut config: GateConfig) -> GateConfig {
        if let Ok(v) = std::env::var("TOLLGATE_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("TOLLGATE_LEDGER_DB") {
            config.ledger.db_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("TOLLGATE_APPROVAL_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                config.ledger.timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("TOLLGATE_STRICT_ARGUMENTS") {
            if let Ok(strict) = v.parse::<bool>() {
                config.dispatch.strict_arguments = strict;
            }
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&self) -> tollgate_core::Result<()> {
        if !self.config_path.exists() {
            return Err(GateError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::read(&self.config_path)?;
        new_config.validate().map_err(GateError::Config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
