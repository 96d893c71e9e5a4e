use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// An expected executable is missing from the instance files.
    #[error("{} not found ({})", .file_name, .path.display())]
    NotFound { file_name: String, path: PathBuf },

    /// The OS refused to start the process.
    #[error("{0}")]
    Launch(#[source] io::Error),

    #[error("I/O error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("process error: {0}")]
    Process(#[source] io::Error),

    #[error("server console is not embedded")]
    NotEmbedded,
}

impl AdapterError {
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        AdapterError::NotFound {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_path_buf(),
        }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| AdapterError::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_file_and_path() {
        let path = Path::new("servers").join("1").join("server.exe");
        let message = AdapterError::not_found(&path).to_string();
        assert!(message.starts_with("server.exe not found ("));
        assert!(message.contains(&path.display().to_string()));
    }
}
