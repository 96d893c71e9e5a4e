use crate::management::comm::ProcessStartInfo;
use crate::storage::paths::join_segments;
use satisfactory_protocol::game::{PROJECT_NAME, START_PATH};
use satisfactory_protocol::management::instance::InstanceSettings;
use std::fmt;
use std::path::{Path, PathBuf};

/// Headless flags the dedicated server expects when run by a manager.
const MODE_FLAGS: [&str; 2] = ["-log", "-unattended"];

/// Launch arguments, in the order they are passed to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs(Vec<String>);

impl LaunchArgs {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for LaunchArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

pub trait InstanceSettingsExt {
    fn get_start_path(&self, root: &Path) -> PathBuf;
    fn get_launch_args(&self) -> LaunchArgs;
    fn get_start_info(&self, root: &Path) -> ProcessStartInfo;
}

impl InstanceSettingsExt for InstanceSettings {
    fn get_start_path(&self, root: &Path) -> PathBuf {
        join_segments(root, START_PATH)
    }

    fn get_launch_args(&self) -> LaunchArgs {
        let mut args = vec![PROJECT_NAME.to_string()];
        args.extend(MODE_FLAGS.iter().map(|flag| flag.to_string()));
        args.extend(self.extra_params.split_whitespace().map(str::to_string));
        if let Some(port) = non_blank(&self.port) {
            args.push(format!("-Port={}", port));
        }
        if let Some(query_port) = non_blank(&self.query_port) {
            args.push(format!("-ServerQueryPort={}", query_port));
        }
        if let Some(ip) = non_blank(&self.ip) {
            args.push(format!("-Multihome={}", ip));
        }
        LaunchArgs(args)
    }

    fn get_start_info(&self, root: &Path) -> ProcessStartInfo {
        ProcessStartInfo {
            target: self.get_start_path(root),
            args: self.get_launch_args().into_vec(),
            working_dir: root.to_path_buf(),
            redirect: self.embed_console,
        }
    }
}
