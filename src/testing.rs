//! In-memory clipboard and transport used by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clipboard::ClipboardAccess;
use crate::error::{ClipboardError, UploadError};
use crate::http::Transport;
use crate::types::{HttpResponse, MultipartFile};

#[derive(Clone)]
pub(crate) enum Snapshot {
    Image(Vec<u8>),
    Empty,
    Fault,
    /// The platform clipboard could not be opened this tick.
    Unavailable,
}

/// Replays a scripted series of clipboard snapshots, one per read. Once the
/// script runs out the clipboard reads as empty and the stop flag, if any, is
/// raised.
pub(crate) struct FakeClipboard {
    script: VecDeque<Snapshot>,
    pub text: Option<String>,
    pub writes: usize,
    pub fail_writes: bool,
    stop: Option<Arc<AtomicBool>>,
}

impl FakeClipboard {
    pub fn new(script: Vec<Snapshot>) -> Self {
        Self {
            script: script.into(),
            text: None,
            writes: 0,
            fail_writes: false,
            stop: None,
        }
    }

    pub fn stopping(script: Vec<Snapshot>, stop: Arc<AtomicBool>) -> Self {
        Self {
            stop: Some(stop),
            ..Self::new(script)
        }
    }
}

impl ClipboardAccess for FakeClipboard {
    fn read_image(&mut self) -> Result<Option<Vec<u8>>, ClipboardError> {
        let next = self.script.pop_front();
        if self.script.is_empty() {
            if let Some(stop) = &self.stop {
                stop.store(true, Ordering::SeqCst);
            }
        }
        match next {
            Some(Snapshot::Image(bytes)) => Ok(Some(bytes)),
            Some(Snapshot::Fault) => Err(ClipboardError::Access("clipboard busy".to_string())),
            Some(Snapshot::Unavailable) => {
                Err(ClipboardError::Unavailable("no display connection".to_string()))
            }
            Some(Snapshot::Empty) | None => Ok(None),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.fail_writes {
            return Err(ClipboardError::Access("clipboard busy".to_string()));
        }
        self.writes += 1;
        self.text = Some(text.to_string());
        Ok(())
    }
}

/// Records requests. Uploads answer from a queue of canned responses, falling
/// back to a success whose path is `/uploads/<n>.png`.
pub(crate) struct FakeTransport {
    health: RefCell<Result<HttpResponse, UploadError>>,
    uploads: RefCell<VecDeque<Result<HttpResponse, UploadError>>>,
    gets: RefCell<Vec<String>>,
    posts: RefCell<Vec<(String, MultipartFile)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            health: RefCell::new(Ok(HttpResponse {
                status: 200,
                body: r#"{"status":"ok"}"#.to_string(),
            })),
            uploads: RefCell::new(VecDeque::new()),
            gets: RefCell::new(Vec::new()),
            posts: RefCell::new(Vec::new()),
        }
    }

    pub fn set_health(&self, response: Result<HttpResponse, UploadError>) {
        *self.health.borrow_mut() = response;
    }

    pub fn push_upload(&self, response: Result<HttpResponse, UploadError>) {
        self.uploads.borrow_mut().push_back(response);
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.borrow().clone()
    }

    pub fn posts(&self) -> Vec<(String, MultipartFile)> {
        self.posts.borrow().clone()
    }

    pub fn uploaded_bytes(&self) -> Vec<Vec<u8>> {
        self.posts
            .borrow()
            .iter()
            .map(|(_, file)| file.bytes.clone())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, UploadError> {
        self.gets.borrow_mut().push(url.to_string());
        self.health.borrow().clone()
    }

    fn post_multipart(
        &self,
        url: &str,
        file: MultipartFile,
        _timeout: Duration,
    ) -> Result<HttpResponse, UploadError> {
        let size = file.bytes.len();
        self.posts.borrow_mut().push((url.to_string(), file));
        let n = self.posts.borrow().len();
        self.uploads.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 200,
                body: format!(r#"{{"success":true,"path":"/uploads/{}.png","size":{}}}"#, n, size),
            })
        })
    }
}
