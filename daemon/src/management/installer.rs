use crate::management::comm::{InstanceProcess, ProcessStartInfo};
use crate::management::console::ConsoleSink;
use crate::management::AdapterError;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(windows)]
pub const STEAMCMD_PATH: &str = "steamcmd/steamcmd.exe";
#[cfg(not(windows))]
pub const STEAMCMD_PATH: &str = "steamcmd/steamcmd.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub instance: Uuid,
    pub install_dir: PathBuf,
    pub app_id: String,
    pub validate: bool,
    /// beta branch; `None` for the default branch
    pub channel: Option<String>,
    pub login_anonymous: bool,
}

/// What an installer hands back: its process if it started, and its error text.
pub struct InstallerRun {
    pub process: Option<InstanceProcess>,
    pub error: Option<String>,
}

impl InstallerRun {
    pub fn started(process: InstanceProcess) -> Self {
        Self {
            process: Some(process),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            process: None,
            error: Some(error.into()),
        }
    }
}

/// Installs or updates the files of an instance.
#[async_trait::async_trait]
pub trait Installer: Send + Sync {
    async fn update(&self, request: &UpdateRequest) -> InstallerRun;
}

pub struct SteamCmd {
    executable: PathBuf,
    console: Arc<dyn ConsoleSink>,
}

impl SteamCmd {
    pub fn new(executable: impl Into<PathBuf>, console: Arc<dyn ConsoleSink>) -> Self {
        Self {
            executable: executable.into(),
            console,
        }
    }

    pub fn get_args(request: &UpdateRequest) -> Vec<String> {
        let mut args = vec![
            "+force_install_dir".to_string(),
            request.install_dir.to_string_lossy().to_string(),
        ];
        if request.login_anonymous {
            args.push("+login".into());
            args.push("anonymous".into());
        }
        args.push("+app_update".into());
        args.push(request.app_id.clone());
        if let Some(channel) = &request.channel {
            args.push("-beta".into());
            args.push(channel.clone());
        }
        if request.validate {
            args.push("validate".into());
        }
        args.push("+quit".into());
        args
    }
}

#[async_trait::async_trait]
impl Installer for SteamCmd {
    async fn update(&self, request: &UpdateRequest) -> InstallerRun {
        if !self.executable.exists() {
            return InstallerRun::failed(AdapterError::not_found(&self.executable).to_string());
        }

        // steamcmd wants an absolute install dir, it runs from its own directory
        let install_dir = if request.install_dir.is_absolute() {
            request.install_dir.clone()
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(&request.install_dir),
                Err(err) => return InstallerRun::failed(err.to_string()),
            }
        };
        if let Err(err) = tokio::fs::create_dir_all(&install_dir).await {
            return InstallerRun::failed(AdapterError::io(&install_dir)(err).to_string());
        }

        let request = UpdateRequest {
            install_dir,
            ..request.clone()
        };
        let start_info = ProcessStartInfo {
            target: self.executable.clone(),
            args: Self::get_args(&request),
            working_dir: self
                .executable
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf(),
            redirect: true,
        };
        info!(
            "instance(uuid={}) updating app {} into {}",
            request.instance,
            request.app_id,
            request.install_dir.display()
        );
        match InstanceProcess::spawn(start_info, request.instance, self.console.clone()) {
            Ok(process) => InstallerRun::started(process),
            Err(err) => {
                warn!("failed to start steamcmd: {}", err);
                InstallerRun::failed(err.to_string())
            }
        }
    }
}
