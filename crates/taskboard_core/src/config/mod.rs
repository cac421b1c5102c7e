use crate::audit::RECENT_LIMIT;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKBOARD_CONFIG_PATH";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// User id to act as when none is given on the command line.
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub recent_log_limit: Option<usize>,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn recent_log_limit(&self) -> usize {
        self.recent_log_limit
            .unwrap_or(RECENT_LIMIT)
            .clamp(1, RECENT_LIMIT)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub actor: Option<String>,
    pub log_level: Option<String>,
    pub recent_log_limit: Option<usize>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("taskboard")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskboard")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;

    if let Some(level) = config.log_level.as_deref() {
        let normalized = canonical_log_level(level).ok_or_else(|| {
            AppError::invalid_data(format!("unknown log_level '{level}' in {}", path.display()))
        })?;
        config.log_level = Some(normalized);
    }
    config.actor = config
        .actor
        .map(|actor| actor.trim().to_string())
        .filter(|actor| !actor.is_empty());

    Ok(config)
}

/// Lowercases and maps common aliases onto tracing's level names.
pub fn canonical_log_level(raw: &str) -> Option<String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace".to_string()),
        "debug" => Some("debug".to_string()),
        "info" => Some("info".to_string()),
        "warn" | "warning" => Some("warn".to_string()),
        "error" => Some("error".to_string()),
        "off" | "none" | "quiet" => Some("off".to_string()),
        _ => None,
    }
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(store_path) = overrides.store_path.as_ref() {
        merged.store_path = Some(store_path.clone());
    }
    if let Some(actor) = overrides.actor.as_ref() {
        merged.actor = Some(actor.clone());
    }
    if let Some(level) = overrides.log_level.as_deref()
        && let Some(normalized) = canonical_log_level(level)
    {
        merged.log_level = Some(normalized);
    }
    if let Some(limit) = overrides.recent_log_limit {
        merged.recent_log_limit = Some(limit);
    }

    merged
}
