use std::fs::{self, File};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Error, Result};

/// Unpacks a zip archive into `dest`. Entries with paths escaping `dest` are
/// rejected by the zip reader.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| Error::Archive {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;
    zip.extract(dest).map_err(|e| Error::Archive {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Extracts the dataset payload in place when it is a single `.zip` file.
///
/// Does nothing (and returns `false`) once any subdirectory exists, which is
/// also how an earlier extraction is recognised. JSON sidecars are ignored
/// when counting files.
pub fn unpack_single_archive(dir: &Path) -> Result<bool> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_dir() {
            return Ok(false);
        }
        if !has_extension(&path, "json") {
            files.push(path);
        }
    }

    match files.as_slice() {
        [only] if has_extension(only, "zip") => {
            tracing::info!("extracting {}", only.display());
            extract_archive(only, dir)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn single_zip_is_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("info.json"), "{}").unwrap();
        write_zip(&dir.path().join("data.zip"), &[("cats/a.txt", b"a"), ("dogs/b.txt", b"b")]);

        assert!(unpack_single_archive(dir.path()).unwrap());
        assert_eq!(fs::read(dir.path().join("cats/a.txt")).unwrap(), b"a");
        assert!(dir.path().join("dogs/b.txt").is_file());

        // Subdirectories now exist, so a second call is a no-op.
        assert!(!unpack_single_archive(dir.path()).unwrap());
    }

    #[test]
    fn several_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join("one.zip"), &[("x/a.txt", b"a")]);
        fs::write(dir.path().join("readme.txt"), "hi").unwrap();
        assert!(!unpack_single_archive(dir.path()).unwrap());
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn broken_archive_reports_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.zip"), b"definitely not a zip").unwrap();
        assert!(matches!(unpack_single_archive(dir.path()), Err(Error::Archive { .. })));
    }
}
