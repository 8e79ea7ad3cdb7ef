use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Contents API of the course repository.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com/repos/RNA-UNIV/rna/contents";

/// Directory inside the remote repository that mirrors the local cache layout.
pub const DEFAULT_REPO_DIR: &str = "descargas";

/// Name of the cache root created under the working directory.
pub const DEFAULT_CACHE_DIR_NAME: &str = "rna_descargas";

pub const MODELS_DIR: &str = "modelos";
pub const DATA_DIR: &str = "datos";
pub const SAMPLES_DIR: &str = "ejemplos";

/// Where the cache lives and which remote repository it mirrors.
///
/// # Fields
/// - `base_dir` — local cache root; `modelos/`, `datos/` and `ejemplos/` are
///                created beneath it
/// - `base_url` — contents API root; listings are fetched from
///                `{base_url}/{path}`
/// - `repo_dir` — remote directory whose `datos/` subtree holds the datasets
/// - `verbose`  — log every downloaded file at `info` instead of `debug`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub base_dir: PathBuf,
    pub base_url: String,
    pub repo_dir: String,
    pub verbose: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        CacheConfig {
            base_dir: cwd.join(DEFAULT_CACHE_DIR_NAME),
            base_url: DEFAULT_BASE_URL.to_owned(),
            repo_dir: DEFAULT_REPO_DIR.to_owned(),
            verbose: true,
        }
    }
}

impl CacheConfig {
    /// Default configuration rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        CacheConfig { base_dir: base_dir.into(), ..CacheConfig::default() }
    }

    /// Serializes the configuration to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a configuration; missing fields take their defaults.
    pub fn load_json(path: &Path) -> Result<CacheConfig> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Remote path holding the dataset directories.
    pub fn remote_data_path(&self) -> String {
        format!("{}/{}", self.repo_dir.trim_end_matches('/'), DATA_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{ "base_dir": "/tmp/somewhere", "verbose": false }"#).unwrap();

        let config = CacheConfig::load_json(&path).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/tmp/somewhere"));
        assert!(!config.verbose);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.repo_dir, DEFAULT_REPO_DIR);
    }

    #[test]
    fn save_then_load_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let config = CacheConfig {
            base_dir: dir.path().join("cache"),
            base_url: "http://127.0.0.1:9/contents".into(),
            repo_dir: "bundle".into(),
            verbose: false,
        };
        config.save_json(&path).unwrap();
        assert_eq!(CacheConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn remote_data_path_joins_repo_dir() {
        let mut config = CacheConfig::with_base_dir("/tmp/x");
        assert_eq!(config.remote_data_path(), "descargas/datos");
        config.repo_dir = "other/".into();
        assert_eq!(config.remote_data_path(), "other/datos");
    }
}
