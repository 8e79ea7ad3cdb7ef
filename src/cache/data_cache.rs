use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::cache::config::{CacheConfig, DATA_DIR, MODELS_DIR, SAMPLES_DIR};
use crate::cache::remote::{EntryKind, HttpRemote, RemoteSource};
use crate::error::{Error, Result};
use crate::table::{parse_table, Cell, Table, TableOptions};
use crate::vision::{load_image_folder, ImageSet};

/// Name of the optional metadata sidecar in each dataset directory.
pub const INFO_FILE: &str = "info.json";

// ---------------------------------------------------------------------------
// DataCache
// ---------------------------------------------------------------------------

/// Local mirror of the course repository's datasets.
///
/// Construct one explicitly and pass it to whoever needs data; nothing is
/// shared behind the caller's back. Every dataset operation first *resolves*
/// the name: if `datos/<name>` is missing locally it is created and the
/// remote tree is downloaded into it. An existing directory is trusted as-is,
/// with no freshness check.
pub struct DataCache<R = HttpRemote> {
    config: CacheConfig,
    remote: R,
    models_dir: PathBuf,
    data_dir: PathBuf,
    samples_dir: PathBuf,
}

impl DataCache<HttpRemote> {
    /// Cache talking to `config.base_url` over HTTP.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let remote = HttpRemote::new(config.base_url.clone())?;
        DataCache::with_remote(config, remote)
    }
}

impl<R: RemoteSource> DataCache<R> {
    /// Cache using any remote source. Creates the base directory and its
    /// `modelos/`, `datos/` and `ejemplos/` subdirectories.
    pub fn with_remote(config: CacheConfig, remote: R) -> Result<Self> {
        let models_dir = config.base_dir.join(MODELS_DIR);
        let data_dir = config.base_dir.join(DATA_DIR);
        let samples_dir = config.base_dir.join(SAMPLES_DIR);
        for dir in [&config.base_dir, &models_dir, &data_dir, &samples_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(DataCache { config, remote, models_dir, data_dir, samples_dir })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn samples_dir(&self) -> &Path {
        &self.samples_dir
    }

    // -----------------------------------------------------------------------
    // Remote-only operations
    // -----------------------------------------------------------------------

    /// Names of the datasets published in the remote repository.
    pub fn list_datasets(&self) -> Result<Vec<String>> {
        let entries = self.remote.list(&self.config.remote_data_path())?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Dir)
            .map(|entry| entry.name)
            .collect())
    }

    /// Downloads the remote directory `remote_path` into
    /// `{base_dir}/{local_subpath}`. Files already present are kept unless
    /// `force` is set.
    pub fn download(&self, remote_path: &str, local_subpath: &str, force: bool) -> Result<PathBuf> {
        let local = self.config.base_dir.join(local_subpath);
        fs::create_dir_all(&local).map_err(|e| Error::io(&local, e))?;
        self.download_directory(remote_path, &local, force)?;
        Ok(local)
    }

    // -----------------------------------------------------------------------
    // Dataset resolution
    // -----------------------------------------------------------------------

    /// Maps a dataset name to a populated local directory, downloading it on
    /// first use.
    ///
    /// # Errors
    /// - [`Error::Network`]  — a listing or file download failed; the
    ///                         directory created for this attempt is removed
    /// - [`Error::NotFound`] — the directory holds no files afterwards; a
    ///                         directory created by this call is removed too
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let name = normalize_name(name)?;
        let local = self.data_dir.join(&name);

        let created = !local.exists();
        if created {
            fs::create_dir_all(&local).map_err(|e| Error::io(&local, e))?;
            let remote = format!("{}/{}", self.config.remote_data_path(), name);
            if let Err(err) = self.download_directory(&remote, &local, false) {
                discard_dir(&local);
                return Err(err);
            }
        }

        if !contains_files(&local)? {
            if created {
                discard_dir(&local);
            }
            return Err(Error::NotFound(format!(
                "dataset \"{}\" has no data files in {}",
                name,
                local.display()
            )));
        }
        Ok(local)
    }

    /// Re-downloads every file of a dataset, overwriting local copies.
    pub fn refresh(&self, name: &str) -> Result<PathBuf> {
        let name = normalize_name(name)?;
        let local = self.data_dir.join(&name);
        fs::create_dir_all(&local).map_err(|e| Error::io(&local, e))?;
        let remote = format!("{}/{}", self.config.remote_data_path(), name);
        self.download_directory(&remote, &local, true)?;
        self.resolve(&name)
    }

    /// Local directory of a dataset, resolved but not parsed.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        self.resolve(name)
    }

    // -----------------------------------------------------------------------
    // Parsed views
    // -----------------------------------------------------------------------

    /// Contents of the dataset's `info.json`.
    pub fn info(&self, name: &str) -> Result<Map<String, Value>> {
        let dir = self.resolve(name)?;
        let info_path = dir.join(INFO_FILE);
        if !info_path.is_file() {
            return Err(Error::NotFound(format!(
                "no information about dataset \"{}\" ({} is missing)",
                name.to_lowercase(),
                info_path.display()
            )));
        }
        let bytes = fs::read(&info_path).map_err(|e| Error::io(&info_path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// First data file of the dataset parsed as a delimited table.
    pub fn load_table(&self, name: &str, options: &TableOptions) -> Result<Table> {
        let dir = self.resolve(name)?;
        let file = first_data_file(&dir)?;
        tracing::debug!("parsing {}", file.display());
        let bytes = fs::read(&file).map_err(|e| Error::io(&file, e))?;
        parse_table(&bytes, options)
    }

    /// Same as [`DataCache::load_table`], split into column names and rows.
    pub fn load_array(&self, name: &str, options: &TableOptions) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
        Ok(self.load_table(name, options)?.into_parts())
    }

    /// Class-per-subdirectory image dataset; see [`load_image_folder`].
    pub fn load_images(&self, name: &str, resize: Option<(u32, u32)>) -> Result<ImageSet> {
        let dir = self.resolve(name)?;
        load_image_folder(&dir, resize)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Mirrors `remote_path` into `local`, recursing into subdirectories.
    /// Returns the number of files written.
    fn download_directory(&self, remote_path: &str, local: &Path, force: bool) -> Result<usize> {
        let mut written = 0;
        for entry in self.remote.list(remote_path)? {
            if !is_safe_entry_name(&entry.name) {
                tracing::warn!("skipping remote entry with unsafe name {:?}", entry.name);
                continue;
            }
            let target = local.join(&entry.name);
            match entry.kind {
                EntryKind::File => {
                    if !force && target.exists() {
                        continue;
                    }
                    let Some(url) = entry.download_url.as_deref() else {
                        tracing::warn!("remote file {} has no download URL", entry.path);
                        continue;
                    };
                    if self.config.verbose {
                        tracing::info!("downloading {}", target.display());
                    } else {
                        tracing::debug!("downloading {}", target.display());
                    }
                    let bytes = self.remote.fetch(url)?;
                    fs::write(&target, bytes).map_err(|e| Error::io(&target, e))?;
                    written += 1;
                }
                EntryKind::Dir => {
                    fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
                    written += self.download_directory(&entry.path, &target, force)?;
                }
                EntryKind::Other => {
                    tracing::debug!("ignoring remote entry {}", entry.path);
                }
            }
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Lower-cases a dataset name and rejects anything that is not a single path
/// component.
fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || !is_safe_entry_name(&name) {
        return Err(Error::Config(format!("invalid dataset name {:?}", name)));
    }
    Ok(name)
}

fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// `true` if `dir` holds at least one regular file anywhere below it.
fn contains_files(dir: &Path) -> Result<bool> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() || (path.is_dir() && contains_files(&path)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// First regular file by name that is not a JSON sidecar.
fn first_data_file(dir: &Path) -> Result<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            !path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    files.into_iter().next().ok_or_else(|| {
        Error::NotFound(format!("no data files found in {}", dir.display()))
    })
}

fn discard_dir(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        tracing::warn!("could not remove incomplete download {}: {}", dir.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lower_cased_and_single_component() {
        assert_eq!(normalize_name(" Iris ").unwrap(), "iris");
        assert!(matches!(normalize_name(""), Err(Error::Config(_))));
        assert!(matches!(normalize_name("../etc"), Err(Error::Config(_))));
        assert!(matches!(normalize_name(".."), Err(Error::Config(_))));
        assert!(matches!(normalize_name("a\\b"), Err(Error::Config(_))));
    }

    #[test]
    fn first_data_file_skips_json_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("info.json"), "{}").unwrap();
        fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("a.txt"), "x\n1\n").unwrap();
        fs::create_dir(dir.path().join("0_subdir")).unwrap();

        let file = first_data_file(dir.path()).unwrap();
        assert_eq!(file.file_name().unwrap(), "a.txt");
    }

    #[test]
    fn first_data_file_without_candidates_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("info.JSON"), "{}").unwrap();
        assert!(matches!(first_data_file(dir.path()), Err(Error::NotFound(_))));
    }

    #[test]
    fn contains_files_looks_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        assert!(!contains_files(dir.path()).unwrap());
        fs::write(dir.path().join("a/b/x.png"), [0u8]).unwrap();
        assert!(contains_files(dir.path()).unwrap());
    }
}
