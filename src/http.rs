use std::time::Duration;

use reqwest::blocking::{multipart, Client};

use crate::error::UploadError;
use crate::types::{HttpResponse, MultipartFile};

/// Outbound HTTP used by the uploader.
pub trait Transport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, UploadError>;

    fn post_multipart(
        &self,
        url: &str,
        file: MultipartFile,
        timeout: Duration,
    ) -> Result<HttpResponse, UploadError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, UploadError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(describe)?;
        into_response(response)
    }

    fn post_multipart(
        &self,
        url: &str,
        file: MultipartFile,
        timeout: Duration,
    ) -> Result<HttpResponse, UploadError> {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(file.mime)
            .map_err(describe)?;
        let form = multipart::Form::new().part(file.field, part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .map_err(describe)?;
        into_response(response)
    }
}

fn into_response(response: reqwest::blocking::Response) -> Result<HttpResponse, UploadError> {
    let status = response.status().as_u16();
    let body = response.text().map_err(describe)?;
    Ok(HttpResponse { status, body })
}

fn describe(err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::Transport(format!("request timed out: {}", err))
    } else if err.is_connect() {
        UploadError::Transport(format!("could not connect: {}", err))
    } else {
        UploadError::Transport(err.to_string())
    }
}
