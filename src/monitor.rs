//! The poll loop: read the clipboard, skip images already uploaded, upload new
//! ones and put the returned path on the clipboard.
//!
//! A failed upload does not record the image's fingerprint. If the same image
//! stays on the clipboard it is therefore uploaded again on the next tick,
//! unless it matches the last image that was uploaded successfully. Images
//! over the size cap are the exception: they are reported once and then
//! ignored until something else is copied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::Local;
use log::{debug, error, info, warn};

use crate::clipboard::ClipboardAccess;
use crate::config::MonitorConfig;
use crate::error::{ClipboardError, UploadError};
use crate::fingerprint::{fingerprint, is_new, Fingerprint};
use crate::http::Transport;
use crate::types::Uploaded;
use crate::uploader::Uploader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoImage,
    Unchanged,
    Uploaded(Uploaded),
    UploadFailed(UploadError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub uploaded: u64,
    pub failed: u64,
    pub faults: u64,
}

pub struct Monitor<C, T> {
    clipboard: C,
    uploader: Uploader<T>,
    config: MonitorConfig,
    last_fingerprint: Option<Fingerprint>,
    /// Oversized image still sitting on the clipboard.
    skipped: Option<Fingerprint>,
    stats: SessionStats,
}

impl<C: ClipboardAccess, T: Transport> Monitor<C, T> {
    pub fn new(clipboard: C, uploader: Uploader<T>, config: MonitorConfig) -> Self {
        Self {
            clipboard,
            uploader,
            config,
            last_fingerprint: None,
            skipped: None,
            stats: SessionStats::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn clipboard(&self) -> &C {
        &self.clipboard
    }

    #[cfg(test)]
    pub(crate) fn uploader(&self) -> &Uploader<T> {
        &self.uploader
    }

    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last_fingerprint.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Probes the service once. A failure is only a warning.
    pub fn check_connectivity(&self) -> bool {
        match self.uploader.probe() {
            Ok(report) => {
                info!("Connected to image service at {}", self.uploader.base_url());
                if let Some(dir) = report.upload_dir {
                    info!("Service stores uploads in {}", dir);
                }
                true
            }
            Err(UploadError::Rejected { status, .. }) => {
                warn!("Health check returned HTTP {}", status);
                false
            }
            Err(e) => {
                warn!("Could not connect to {}: {}", self.uploader.base_url(), e);
                warn!("The monitor will still run, but uploads may fail");
                false
            }
        }
    }

    /// Runs until `stop` is raised. The flag is checked once per tick, so an
    /// in-flight upload always completes or times out first.
    pub fn run(&mut self, stop: &AtomicBool) {
        self.check_connectivity();

        info!("Clipboard monitor started. Press Ctrl+C to stop.");
        info!("Images will be uploaded to: {}", self.uploader.upload_endpoint());

        while !stop.load(Ordering::SeqCst) {
            thread::sleep(self.config.poll_interval);
            if stop.load(Ordering::SeqCst) {
                break;
            }

            match self.run_cycle() {
                Ok(outcome) => debug!("Cycle finished: {:?}", outcome),
                Err(e) => {
                    self.stats.faults += 1;
                    error!("Unexpected clipboard error: {}", e);
                    thread::sleep(self.config.error_pause);
                }
            }
        }

        info!(
            "Monitor stopped. {} uploaded, {} failed this session",
            self.stats.uploaded, self.stats.failed
        );
    }

    pub fn run_cycle(&mut self) -> Result<CycleOutcome, ClipboardError> {
        let Some(bytes) = self.clipboard.read_image()? else {
            self.skipped = None;
            return Ok(CycleOutcome::NoImage);
        };

        let fp = fingerprint(&bytes);
        if self.skipped == Some(fp) || !is_new(&fp, self.last_fingerprint.as_ref()) {
            return Ok(CycleOutcome::Unchanged);
        }
        self.skipped = None;
        debug!("New clipboard image {} ({} bytes)", fp, bytes.len());

        let uploaded = match self.uploader.upload(&bytes) {
            Ok(uploaded) => uploaded,
            Err(e @ UploadError::TooLarge { .. }) => {
                self.stats.failed += 1;
                self.skipped = Some(fp);
                warn!("Skipping clipboard image: {}", e);
                return Ok(CycleOutcome::UploadFailed(e));
            }
            Err(e) => {
                self.stats.failed += 1;
                error!("Upload failed: {}", e);
                return Ok(CycleOutcome::UploadFailed(e));
            }
        };

        self.stats.uploaded += 1;
        // Record before the write-back so a clipboard fault cannot cause a re-upload.
        self.last_fingerprint = Some(fp);
        info!(
            "[{}] Uploaded: {} ({:.1} KB)",
            Local::now().format("%H:%M:%S"),
            uploaded.file_name,
            uploaded.size as f64 / 1024.0
        );

        self.clipboard.write_text(&uploaded.path)?;
        info!("Path copied to clipboard: {}", uploaded.path);

        Ok(CycleOutcome::Uploaded(uploaded))
    }
}
