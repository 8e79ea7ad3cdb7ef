use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::vision::archive::unpack_single_archive;
use crate::vision::image_data::{load_image, Image};

/// File extensions (lower case) read as images.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Images with their class labels.
///
/// `labels[i]` is the class of `images[i]` and indexes into `classes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSet {
    pub images: Vec<Image>,
    pub labels: Vec<usize>,
    pub classes: Vec<String>,
}

impl ImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn class_name(&self, label: usize) -> Option<&str> {
        self.classes.get(label).map(String::as_str)
    }

    /// Number of images per class, indexed by label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Loads a class-per-subdirectory image dataset rooted at `dir`.
///
/// A lone `.zip` payload is extracted first. Every visible subdirectory is a
/// class; classes are numbered in sorted name order so labels do not depend
/// on filesystem enumeration. Files with a supported extension are decoded
/// and, when `resize` is given, resized to `(width, height)`. A file that
/// fails to decode is logged and skipped.
///
/// # Errors
/// [`Error::NotFound`] when there are no class directories or no image
/// decodes successfully.
pub fn load_image_folder(dir: &Path, resize: Option<(u32, u32)>) -> Result<ImageSet> {
    unpack_single_archive(dir)?;

    let class_dirs = sorted_entries(dir, |p| p.is_dir() && !is_hidden(p))?;
    if class_dirs.is_empty() {
        return Err(Error::NotFound(format!(
            "no class subdirectories in {}",
            dir.display()
        )));
    }

    let mut set = ImageSet::default();
    for (label, class_dir) in class_dirs.iter().enumerate() {
        let class_name = class_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        set.classes.push(class_name);

        let files = sorted_entries(class_dir, |p| p.is_file() && is_supported(p))?;
        for file in files {
            match load_image(&file, resize) {
                Ok(image) => {
                    set.images.push(image);
                    set.labels.push(label);
                }
                Err(err) => tracing::warn!("skipping image: {}", err),
            }
        }
    }

    if set.is_empty() {
        return Err(Error::NotFound(format!("no readable images in {}", dir.display())));
    }
    tracing::debug!(
        "loaded {} images in {} classes from {}",
        set.len(),
        set.classes.len(),
        dir.display()
    );
    Ok(set)
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Dot-directories and the `__MACOSX` folder some zip tools add.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n == "__MACOSX")
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}
