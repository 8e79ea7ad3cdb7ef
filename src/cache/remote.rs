use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CLIENT_AGENT: &str = concat!("rna-kit/", env!("CARGO_PKG_VERSION"));

/// Kind of an entry in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else; never downloaded.
    #[serde(other)]
    Other,
}

/// One item of a contents API listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Path relative to the repository root; used to list subdirectories.
    pub path: String,
    /// Raw content URL; only present for files.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Read-only access to the remote repository.
///
/// Implementations perform exactly one attempt per call and report any
/// failure as [`Error::Network`].
pub trait RemoteSource {
    /// Lists the directory at `path` (relative to the API root).
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Downloads the raw bytes behind a file's `download_url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `RemoteSource` backed by a blocking `reqwest` client.
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .build()
            .map_err(|e| Error::network(&base_url, e))?;
        Ok(HttpRemote { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str, accept: &str) -> Result<reqwest::blocking::Response> {
        self.client
            .get(url)
            .header(USER_AGENT, CLIENT_AGENT)
            .header(ACCEPT, accept)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::network(url, e))
    }
}

impl RemoteSource for HttpRemote {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        tracing::debug!("listing {}", url);
        self.get(&url, "application/json")?
            .json::<Vec<RemoteEntry>>()
            .map_err(|e| Error::network(&url, e))
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url, "*/*")?
            .bytes()
            .map_err(|e| Error::network(url, e))?;
        Ok(bytes.to_vec())
    }
}
