use anyhow::Context;
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

pub trait FileIoWithBackup {
    /// Overwrites `path`, keeping the previous content as `<name>.bak`.
    fn write_with_backup<P: AsRef<Path>>(path: P, content: &str) -> std::io::Result<()> {
        let path = path.as_ref();
        if path.is_file() {
            std::fs::copy(path, path.with_extension("bak"))?;
        }
        std::fs::write(path, content)
    }
}

/// Json file backed settings.
pub trait Config: FileIoWithBackup {
    type ConfigType: Serialize + DeserializeOwned;

    fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Self::ConfigType> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("invalid json in {}", path.display()))
    }

    fn save_config<P: AsRef<Path>>(path: P, config: &Self::ConfigType) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(config)?;
        Self::write_with_backup(path, &content)
            .with_context(|| format!("could not write {}", path.display()))
    }

    /// Loads `path`, or writes `default()` there first when it does not exist.
    fn load_config_or_default<P: AsRef<Path>, F: FnOnce() -> Self::ConfigType>(
        path: P,
        default: F,
    ) -> anyhow::Result<Self::ConfigType> {
        let path = path.as_ref();
        if path.is_file() {
            return Self::load_config(path);
        }
        info!("{} not found, writing defaults", path.display());
        let config = default();
        Self::save_config(path, &config)?;
        Ok(config)
    }
}

/// Replaces `path` with `content` through a sibling temp file, so readers
/// never observe a half-written file.
pub async fn write_replace(path: &Path, content: impl AsRef<[u8]>) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, content.as_ref()).await?;
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: u32,
    }

    impl FileIoWithBackup for Sample {}

    impl Config for Sample {
        type ConfigType = Sample;
    }

    #[test]
    fn load_or_default_writes_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let loaded = Sample::load_config_or_default(&path, || Sample { value: 3 }).unwrap();
        assert_eq!(loaded, Sample { value: 3 });
        assert!(path.is_file());

        // present now, default is ignored
        let loaded = Sample::load_config_or_default(&path, Sample::default).unwrap();
        assert_eq!(loaded, Sample { value: 3 });
    }

    #[test]
    fn save_keeps_backup_of_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        Sample::save_config(&path, &Sample { value: 1 }).unwrap();
        Sample::save_config(&path, &Sample { value: 2 }).unwrap();

        let backup = Sample::load_config(dir.path().join("config.bak")).unwrap();
        assert_eq!(backup, Sample { value: 1 });
        assert_eq!(Sample::load_config(&path).unwrap(), Sample { value: 2 });
    }

    #[test]
    fn broken_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Sample::load_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[tokio::test]
    async fn write_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.ini");
        std::fs::write(&path, "old").unwrap();

        write_replace(&path, "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join("Game.ini.tmp").exists());
    }
}
