use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma};
use rna_kit::cache::{EntryKind, RemoteEntry};
use rna_kit::{CacheConfig, Cell, DataCache, Error, RemoteSource, Result, TableOptions};

// ---------------------------------------------------------------------------
// In-memory remote
// ---------------------------------------------------------------------------

/// Serves a fixed repository tree and counts every call.
#[derive(Default)]
struct FakeRemote {
    dirs: HashMap<String, Vec<RemoteEntry>>,
    files: HashMap<String, Vec<u8>>,
    lists: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeRemote {
    /// Adds a file at `path` (relative to the repository root), creating
    /// parent listings as needed.
    fn file(mut self, path: &str, bytes: &[u8]) -> Self {
        let url = format!("mem://{}", path);
        self.files.insert(url.clone(), bytes.to_vec());
        self.add_entry(path, EntryKind::File, Some(url));
        self
    }

    fn add_entry(&mut self, path: &str, kind: EntryKind, download_url: Option<String>) {
        let (parent, name) = path.rsplit_once('/').unwrap();
        let listing = self.dirs.entry(parent.to_owned()).or_default();
        if listing.iter().any(|e| e.name == name) {
            return;
        }
        listing.push(RemoteEntry {
            name: name.to_owned(),
            kind,
            path: path.to_owned(),
            download_url,
        });
        if parent.contains('/') {
            self.add_entry(parent, EntryKind::Dir, None);
        }
    }

    fn calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst) + self.fetches.load(Ordering::SeqCst)
    }
}

impl RemoteSource for FakeRemote {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| Error::network(path, "404 Not Found"))
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| Error::network(url, "404 Not Found"))
    }
}

fn png(value: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([value])))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn cache(remote: FakeRemote) -> (tempfile::TempDir, DataCache<FakeRemote>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CacheConfig::with_base_dir(dir.path().join("rna_descargas"));
    config.verbose = false;
    let cache = DataCache::with_remote(config, remote).unwrap();
    (dir, cache)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn construction_creates_the_three_cache_directories() {
    let (_dir, cache) = cache(FakeRemote::default());
    assert!(cache.models_dir().ends_with("modelos") && cache.models_dir().is_dir());
    assert!(cache.data_dir().ends_with("datos") && cache.data_dir().is_dir());
    assert!(cache.samples_dir().ends_with("ejemplos") && cache.samples_dir().is_dir());
}

#[test]
fn resolve_downloads_the_tree_once_and_is_idempotent() {
    let remote = FakeRemote::default()
        .file("descargas/datos/iris/iris.csv", b"a,b\n1,2\n")
        .file("descargas/datos/iris/extra/notes.txt", b"hello");
    let (_dir, cache) = cache(remote);

    let first = cache.resolve("IRIS").unwrap();
    assert!(first.ends_with("datos/iris"));
    assert_eq!(fs::read(first.join("iris.csv")).unwrap(), b"a,b\n1,2\n");
    assert_eq!(fs::read(first.join("extra/notes.txt")).unwrap(), b"hello");

    let calls = cache.remote().calls();
    let second = cache.resolve("iris").unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.remote().calls(), calls, "cached dataset must not touch the network");
}

#[test]
fn network_failure_leaves_no_half_cached_directory() {
    let (_dir, cache) = cache(FakeRemote::default());
    let err = cache.resolve("missing").unwrap_err();
    assert!(matches!(err, Error::Network { .. }));
    assert!(!cache.data_dir().join("missing").exists());
}

#[test]
fn failed_file_download_is_a_network_error() {
    let mut remote = FakeRemote::default().file("descargas/datos/broken/data.csv", b"x\n1\n");
    remote.files.clear();
    let (_dir, cache) = cache(remote);
    assert!(matches!(cache.resolve("broken"), Err(Error::Network { .. })));
    assert!(!cache.data_dir().join("broken").exists());
}

#[test]
fn empty_remote_dataset_is_not_found() {
    let mut remote = FakeRemote::default();
    remote.dirs.insert("descargas/datos/empty".into(), Vec::new());
    let (_dir, cache) = cache(remote);
    assert!(matches!(cache.resolve("empty"), Err(Error::NotFound(_))));
    assert!(!cache.data_dir().join("empty").exists());

    // Nothing was cached, so the next attempt asks the remote again.
    let lists = cache.remote().lists.load(Ordering::SeqCst);
    assert!(cache.resolve("empty").is_err());
    assert!(cache.remote().lists.load(Ordering::SeqCst) > lists);
}

#[test]
fn refresh_overwrites_existing_files() {
    let remote = FakeRemote::default().file("descargas/datos/iris/iris.csv", b"new\n1\n");
    let (_dir, cache) = cache(remote);
    let local = cache.data_dir().join("iris");
    fs::create_dir_all(&local).unwrap();
    fs::write(local.join("iris.csv"), b"old\n0\n").unwrap();

    // resolve trusts the existing directory...
    cache.resolve("iris").unwrap();
    assert_eq!(fs::read(local.join("iris.csv")).unwrap(), b"old\n0\n");

    // ...refresh does not.
    cache.refresh("iris").unwrap();
    assert_eq!(fs::read(local.join("iris.csv")).unwrap(), b"new\n1\n");
}

#[test]
fn download_skips_existing_files_unless_forced() {
    let remote = FakeRemote::default().file("descargas/modelos/mlp/weights.json", b"{}");
    let (_dir, cache) = cache(remote);

    let local = cache.download("descargas/modelos/mlp", "modelos/mlp", false).unwrap();
    assert_eq!(cache.remote().fetches.load(Ordering::SeqCst), 1);

    cache.download("descargas/modelos/mlp", "modelos/mlp", false).unwrap();
    assert_eq!(cache.remote().fetches.load(Ordering::SeqCst), 1);

    cache.download("descargas/modelos/mlp", "modelos/mlp", true).unwrap();
    assert_eq!(cache.remote().fetches.load(Ordering::SeqCst), 2);
    assert!(local.join("weights.json").is_file());
}

#[test]
fn list_datasets_returns_only_directories() {
    let remote = FakeRemote::default()
        .file("descargas/datos/iris/iris.csv", b"x")
        .file("descargas/datos/mnist/train.csv", b"x")
        .file("descargas/datos/README.md", b"x");
    let (_dir, cache) = cache(remote);

    let mut names = cache.list_datasets().unwrap();
    names.sort();
    assert_eq!(names, vec!["iris", "mnist"]);
}

#[test]
fn unsafe_entry_names_are_not_written() {
    let mut remote = FakeRemote::default().file("descargas/datos/evil/ok.csv", b"a\n1\n");
    remote.files.insert("mem://x".into(), b"pwned".to_vec());
    remote.dirs.get_mut("descargas/datos/evil").unwrap().push(RemoteEntry {
        name: "../escape.csv".into(),
        kind: EntryKind::File,
        path: "descargas/datos/evil/../escape.csv".into(),
        download_url: Some("mem://x".into()),
    });
    let (_dir, cache) = cache(remote);

    cache.resolve("evil").unwrap();
    assert!(!cache.data_dir().join("escape.csv").exists());
}

// ---------------------------------------------------------------------------
// Parsed views
// ---------------------------------------------------------------------------

#[test]
fn load_table_detects_separator_and_skips_json() {
    let remote = FakeRemote::default()
        .file("descargas/datos/notas/info.json", br#"{"rows": 2}"#)
        .file("descargas/datos/notas/notas.csv", "alumno;nota\nÁngel;7,5\nEva;9\n".as_bytes());
    let (_dir, cache) = cache(remote);

    let table = cache.load_table("Notas", &TableOptions::default()).unwrap();
    assert_eq!(table.columns, vec!["alumno", "nota"]);
    assert_eq!(table.rows[0][0], Cell::Text("Ángel".into()));
    // Decimal comma is not a number; the whole column stays text.
    assert_eq!(table.rows[1][1], Cell::Text("9".into()));
}

#[test]
fn load_array_rows_match_header_width() {
    let remote = FakeRemote::default()
        .file("descargas/datos/iris/iris.csv", b"sepal,petal,species\n5.1,1.4,setosa\n4.9,,setosa\n6.3,6.0\n");
    let (_dir, cache) = cache(remote);

    let (columns, rows) = cache.load_array("iris", &TableOptions::default()).unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.len() == columns.len()));
    assert_eq!(rows[0][0], Cell::Number(5.1));
}

#[test]
fn info_reads_sidecar_or_reports_not_found() {
    let remote = FakeRemote::default()
        .file("descargas/datos/iris/iris.csv", b"a\n1\n")
        .file("descargas/datos/iris/info.json", br#"{"title": "Iris", "rows": 150}"#)
        .file("descargas/datos/plain/data.csv", b"a\n1\n");
    let (_dir, cache) = cache(remote);

    let info = cache.info("iris").unwrap();
    assert_eq!(info["title"], "Iris");
    assert_eq!(info["rows"], 150);

    assert!(matches!(cache.info("plain"), Err(Error::NotFound(_))));
}

#[test]
fn path_returns_the_resolved_directory() {
    let remote = FakeRemote::default().file("descargas/datos/iris/iris.csv", b"a\n1\n");
    let (_dir, cache) = cache(remote);
    assert_eq!(cache.path("Iris").unwrap(), cache.data_dir().join("iris"));
}

#[test]
fn load_images_skips_corrupt_files() {
    let remote = FakeRemote::default()
        .file("descargas/datos/formas/circulo/1.png", &png(10))
        .file("descargas/datos/formas/circulo/2.png", &png(20))
        .file("descargas/datos/formas/cuadrado/1.png", &png(30))
        .file("descargas/datos/formas/cuadrado/roto.png", b"not a png");
    let (_dir, cache) = cache(remote);

    let set = cache.load_images("formas", Some((8, 8))).unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(set.labels, vec![0, 0, 1]);
    assert_eq!(set.classes, vec!["circulo", "cuadrado"]);
    assert!(set.images.iter().all(|img| (img.width, img.height) == (8, 8)));
}

#[test]
fn load_images_extracts_a_zip_payload() {
    let mut zip_bytes = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
        for (name, value) in [("gatos/a.png", 1u8), ("perros/b.png", 2), ("perros/c.jpg.txt", 3)] {
            zip.start_file(name, zip::write::FileOptions::default()).unwrap();
            zip.write_all(&png(value)).unwrap();
        }
        zip.finish().unwrap();
    }
    let remote = FakeRemote::default()
        .file("descargas/datos/mascotas/mascotas.zip", &zip_bytes)
        .file("descargas/datos/mascotas/info.json", b"{}");
    let (_dir, cache) = cache(remote);

    let set = cache.load_images("mascotas", None).unwrap();
    assert_eq!(set.classes, vec!["gatos", "perros"]);
    assert_eq!(set.class_counts(), vec![1, 1]);
}
