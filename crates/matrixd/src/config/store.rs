use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use toml_edit::DocumentMut;
use tracing::debug;

use super::ConfigError;
use super::MatrixConfig;

/// Persistence for the matrix configuration.
///
/// Renames write the whole updated [`MatrixConfig`] through this trait before
/// a reload is requested.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn save(&self, matrix: &MatrixConfig) -> Result<(), ConfigError>;
}

/// Writes name lists back into the `[matrix]` table of a TOML config file.
///
/// Only `sources` and `zones` are replaced; every other key, comment and the
/// key order in the file are kept as they were.
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn string_array(names: &[String]) -> toml_edit::Item {
    toml_edit::value(names.iter().map(String::as_str).collect::<toml_edit::Array>())
}

#[async_trait]
impl ConfigStore for TomlFileStore {
    async fn save(&self, matrix: &MatrixConfig) -> Result<(), ConfigError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::Io(self.path.clone(), e))?;

        let mut document: DocumentMut = contents.parse()?;
        let table = document
            .get_mut("matrix")
            .and_then(|item| item.as_table_like_mut())
            .ok_or_else(|| ConfigError::InvalidDocument("missing [matrix] table".to_string()))?;

        table.insert("sources", string_array(&matrix.sources));
        table.insert("zones", string_array(&matrix.zones));

        let rendered = document.to_string();

        // Write to a sibling file and rename so a crash never leaves a half-written config
        let tmp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp_path, rendered)
            .await
            .map_err(|e| ConfigError::Write(tmp_path.clone(), e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| ConfigError::Write(self.path.clone(), e))?;

        debug!("Persisted matrix names to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    pub saved: std::sync::Mutex<Vec<MatrixConfig>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_saved(&self) -> Option<MatrixConfig> {
        self.saved.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn save(&self, matrix: &MatrixConfig) -> Result<(), ConfigError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ConfigError::Write(
                PathBuf::from("memory"),
                std::io::Error::other("store is read-only"),
            ));
        }
        self.saved.lock().unwrap().push(matrix.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_save_rewrites_names_and_keeps_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("matrixd.toml");
        fs::write(
            &path,
            r#"
            [logging]
            level = "debug"

            [matrix]
            host = "192.168.1.50"
            poll_interval_secs = 30
            sources = ["Apple TV"]
            "#,
        )
        .unwrap();

        let mut matrix = Config::from_file(&path).unwrap().matrix;
        matrix.sources = vec!["Apple TV".to_string(), "Input 2".to_string(), "PS5".to_string()];
        matrix.zones = vec!["Living Room".to_string()];

        let store = TomlFileStore::new(&path);
        store.save(&matrix).await.unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.matrix.sources, vec!["Apple TV", "Input 2", "PS5"]);
        assert_eq!(reloaded.matrix.zones, vec!["Living Room"]);
        assert_eq!(reloaded.matrix.host, "192.168.1.50");
        assert_eq!(reloaded.matrix.poll_interval_secs, 30);
        assert_eq!(reloaded.logging.level, crate::config::LogLevel::Debug);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_keeps_comments_and_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("matrixd.toml");
        fs::write(
            &path,
            "# Living room rack\n\
             [matrix]\n\
             host = \"192.168.1.50\" # static lease\n\
             sources = [\"Apple TV\"]\n\
             # polled less often at night\n\
             poll_interval_secs = 30\n\
             \n\
             [api]\n\
             port = 9000\n",
        )
        .unwrap();

        let mut matrix = Config::from_file(&path).unwrap().matrix;
        matrix.sources = vec!["Apple TV".to_string(), "PS5".to_string()];
        matrix.zones = vec!["Kitchen".to_string()];
        TomlFileStore::new(&path).save(&matrix).await.unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Living room rack\n[matrix]\n"));
        assert!(written.contains("host = \"192.168.1.50\" # static lease\n"));
        assert!(written.contains("# polled less often at night\npoll_interval_secs = 30\n"));

        let host = written.find("host =").unwrap();
        let sources = written.find("sources =").unwrap();
        let interval = written.find("poll_interval_secs =").unwrap();
        let api = written.find("[api]").unwrap();
        assert!(host < sources && sources < interval && interval < api);

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.matrix.sources, vec!["Apple TV", "PS5"]);
        assert_eq!(reloaded.matrix.zones, vec!["Kitchen"]);
        assert_eq!(reloaded.api.unwrap().port, 9000);
    }

    #[tokio::test]
    async fn test_save_rejects_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("matrixd.toml");
        fs::write(&path, "[matrix\nhost = ").unwrap();

        let store = TomlFileStore::new(&path);
        let err = store.save(&MatrixConfig::new("host")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Edit(_)));
    }

    #[tokio::test]
    async fn test_save_without_matrix_table_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("matrixd.toml");
        fs::write(&path, "[logging]\nlevel = \"info\"\n").unwrap();

        let store = TomlFileStore::new(&path);
        let err = store.save(&MatrixConfig::new("host")).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_save_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlFileStore::new(temp_dir.path().join("absent.toml"));
        let err = store.save(&MatrixConfig::new("host")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
