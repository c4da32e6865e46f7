use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard access failed: {0}")]
    Access(String),

    #[error("unsupported bitmap: {0}")]
    UnsupportedBitmap(String),

    #[error("malformed bitmap: {0}")]
    MalformedBitmap(String),

    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Why an upload or health probe did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The service answered with a status other than 200.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The service answered 200 but reported `success: false`.
    #[error("{0}")]
    Refused(String),

    #[error("invalid response from service: {0}")]
    InvalidResponse(String),

    /// Timeout, refused connection, DNS failure.
    #[error("{0}")]
    Transport(String),

    #[error("image is {size} bytes, upload limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}
