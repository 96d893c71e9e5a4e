use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::management::installer::STEAMCMD_PATH;
use crate::management::AdapterOptions;
use crate::storage::file::{Config, FileIoWithBackup};
use crate::storage::paths::SERVERS_ROOT;
use satisfactory_protocol::management::instance::InstanceSettings;

/// immutable through full lifetime of app, unless restart app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub servers_root: PathBuf,
    pub steamcmd_path: PathBuf,
    pub stop_timeout_secs: u64,
    pub kill_on_timeout: bool,
    /// lines of server output kept in memory
    pub console_capacity: usize,
    pub instance: InstanceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            servers_root: SERVERS_ROOT.into(),
            steamcmd_path: STEAMCMD_PATH.into(),
            stop_timeout_secs: 20,
            kill_on_timeout: false,
            console_capacity: 1000,
            instance: InstanceSettings::default(),
        }
    }
}

impl FileIoWithBackup for AppConfig {}

impl Config for AppConfig {
    type ConfigType = AppConfig;
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
        Self::load_config_or_default(path, Self::default)
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            kill_on_timeout: self.kill_on_timeout,
        }
    }
}
