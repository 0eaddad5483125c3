use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::analysis::ClusterConfig;
use crate::sync::SyncConfig;
use crate::tiles::TileCacheConfig;
use crate::tracking::{BatteryPolicy, SamplerConfig};

pub const ENV_CONFIG_PATH: &str = "SIGNALMAP_CONFIG";
pub const ENV_DATA_DIR: &str = "SIGNALMAP_DATA_DIR";
pub const ENV_ENDPOINT: &str = "SIGNALMAP_ENDPOINT";
pub const ENV_DEBUG: &str = "SIGNALMAP_DEBUG";

const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api";
const DEBUG_DRAIN_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreSettings {
    pub tracking: SamplerConfig,
    pub battery: BatteryPolicy,
    pub tiles: TileCacheConfig,
    pub sync: SyncConfig,
    pub dead_zones: ClusterConfig,
    pub endpoint_base_url: String,
    /// Identity stamped on every uploaded measurement.
    pub reported_by: String,
    /// Where the database lives. Defaults to the settings file's directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            tracking: SamplerConfig::default(),
            battery: BatteryPolicy::default(),
            tiles: TileCacheConfig::default(),
            sync: SyncConfig::default(),
            dead_zones: ClusterConfig::default(),
            endpoint_base_url: DEFAULT_ENDPOINT.into(),
            reported_by: "anonymous".into(),
            data_dir: None,
        }
    }
}

impl CoreSettings {
    /// Apply `SIGNALMAP_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|value| !value.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|value| !value.is_empty()) {
            self.endpoint_base_url = endpoint;
        }
        if lookup(ENV_DEBUG).is_some_and(|value| is_truthy(&value)) {
            self.sync.drain_interval_ms = DEBUG_DRAIN_INTERVAL_MS;
        }
    }
}

pub fn debug_enabled() -> bool {
    env::var(ENV_DEBUG)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// JSON settings file. Unreadable contents fall back to defaults; writes go
/// straight to disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CoreSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings at {} are malformed, using defaults: {err}", path.display());
                CoreSettings::default()
            })
        } else {
            CoreSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Settings path from `SIGNALMAP_CONFIG`, or `signalmap.json` in the
    /// working directory.
    pub fn default_path() -> PathBuf {
        env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("signalmap.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> CoreSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Effective settings: the file contents with environment overrides applied.
    pub fn effective(&self) -> CoreSettings {
        let mut settings = self.get();
        settings.apply_env();
        settings
    }

    pub fn update<F>(&self, change: F) -> Result<CoreSettings>
    where
        F: FnOnce(&mut CoreSettings),
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: CoreSettings = serde_json::from_str(&contents)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &CoreSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
