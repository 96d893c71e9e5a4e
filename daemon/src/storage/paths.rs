use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SERVERS_ROOT: &str = "servers";
const SERVER_FILES: &str = "serverfiles";

/// Resolves where the files of each instance live.
#[derive(Debug, Clone)]
pub struct ServerPaths {
    root: PathBuf,
}

impl Default for ServerPaths {
    fn default() -> Self {
        Self::new(SERVERS_ROOT)
    }
}

impl ServerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/<uuid>/serverfiles`
    pub fn server_files(&self, instance: Uuid) -> PathBuf {
        self.root.join(instance.to_string()).join(SERVER_FILES)
    }
}

/// Joins path segments onto `base`, using the platform separator.
pub fn join_segments(base: &Path, segments: &[&str]) -> PathBuf {
    segments
        .iter()
        .fold(base.to_path_buf(), |path, segment| path.join(segment))
}
