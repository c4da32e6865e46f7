use serde::Deserialize;

use crate::error::UploadError;

/// Body returned by `POST /upload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub status: Option<String>,
    #[serde(rename = "uploadDir")]
    pub upload_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub path: String,
    pub size: u64,
    pub file_name: String,
}

pub type UploadResult = Result<Uploaded, UploadError>;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A single file part of a multipart form.
#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub field: &'static str,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}
