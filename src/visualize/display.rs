use std::fs;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use tiny_http::{Header, Response, Server, StatusCode};

use crate::error::{Error, Result};

const TEMPLATE: &str = include_str!("assets/display.html");
const REFRESH_SECS: u32 = 2;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One rendered figure, ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub epoch: usize,
    pub caption: String,
    /// PNG-encoded figure.
    pub png: Vec<u8>,
}

impl Frame {
    /// The PNG bytes as standard base64.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    /// Notebook-style MIME bundle: `{"image/png": <base64>, "text/plain": caption}`.
    pub fn mime_bundle(&self) -> serde_json::Value {
        json!({
            "image/png": self.base64(),
            "text/plain": self.caption,
        })
    }
}

/// A single output target whose content is replaced on every update.
pub trait DisplaySlot {
    fn update(&mut self, frame: &Frame) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemorySlot
// ---------------------------------------------------------------------------

/// Keeps the most recent frame in memory.
#[derive(Debug, Default)]
pub struct MemorySlot {
    latest: Option<Frame>,
    updates: usize,
}

impl MemorySlot {
    pub fn new() -> Self {
        MemorySlot::default()
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    /// How many times the slot has been replaced.
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl DisplaySlot for MemorySlot {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        self.latest = Some(frame.clone());
        self.updates += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileSlot
// ---------------------------------------------------------------------------

/// Overwrites one PNG file per update. The new image is written next to the
/// target and renamed over it, so viewers never see a half-written file.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSlot { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySlot for FileSlot {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &frame.png).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}

// ---------------------------------------------------------------------------
// HttpSlot
// ---------------------------------------------------------------------------

type SharedFrame = Arc<Mutex<Option<Frame>>>;

/// Serves the latest frame to a browser.
///
/// Routes:
/// - `/`           — auto-refreshing page with the frame inlined as base64
/// - `/frame.png`  — the raw PNG
/// - `/frame.json` — the MIME bundle
///
/// The frame routes answer 404 until the first update. The server thread
/// stops when the slot is dropped.
pub struct HttpSlot {
    server: Arc<Server>,
    latest: SharedFrame,
    addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl HttpSlot {
    /// Binds `addr` (e.g. `"127.0.0.1:7878"`, or port 0 for any free port)
    /// and starts serving.
    pub fn bind(addr: &str) -> Result<HttpSlot> {
        let server = Server::http(addr)
            .map_err(|e| Error::Display(format!("cannot bind {}: {}", addr, e)))?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::Display(format!("{} is not an IP address", addr)))?;

        let server = Arc::new(server);
        let latest: SharedFrame = Arc::new(Mutex::new(None));
        let worker = {
            let server = server.clone();
            let latest = latest.clone();
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    let response = route(request.url(), &latest);
                    let _ = request.respond(response);
                }
            })
        };

        tracing::info!("training preview at http://{}/", local);
        Ok(HttpSlot { server, latest, addr: local, worker: Some(worker) })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl DisplaySlot for HttpSlot {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        *lock(&self.latest) = Some(frame.clone());
        Ok(())
    }
}

impl Drop for HttpSlot {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A panicked request thread cannot leave a frame half-written, so a
/// poisoned lock is still safe to read.
fn lock(latest: &SharedFrame) -> MutexGuard<'_, Option<Frame>> {
    match latest.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn route(url: &str, latest: &SharedFrame) -> Response<Cursor<Vec<u8>>> {
    let path = url.split('?').next().unwrap_or("");
    let frame = lock(latest).clone();

    match (path, frame) {
        ("/", frame) => respond(200, "text/html; charset=utf-8", render_page(frame.as_ref()).into_bytes()),
        ("/frame.png", Some(frame)) => respond(200, "image/png", frame.png),
        ("/frame.json", Some(frame)) => {
            respond(200, "application/json", frame.mime_bundle().to_string().into_bytes())
        }
        _ => respond(404, "text/plain", b"404 Not Found".to_vec()),
    }
}

fn respond(status: u16, content_type: &str, body: Vec<u8>) -> Response<Cursor<Vec<u8>>> {
    let len = body.len();
    let headers: Vec<Header> = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
        .into_iter()
        .collect();
    Response::new(StatusCode(status), headers, Cursor::new(body), Some(len), None)
}

fn render_page(frame: Option<&Frame>) -> String {
    let body = match frame {
        Some(frame) => format!(
            "<img alt=\"epoch {}\" src=\"data:image/png;base64,{}\">\n  <p class=\"caption\">{}</p>",
            frame.epoch,
            frame.base64(),
            html_escape(&frame.caption)
        ),
        None => "<p class=\"waiting\">Waiting for the first epoch…</p>".to_owned(),
    };
    TEMPLATE
        .replace("{{REFRESH_SECS}}", &REFRESH_SECS.to_string())
        .replace("{{BODY}}", &body)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
