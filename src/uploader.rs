use std::time::Duration;

use chrono::{DateTime, Local};
use log::debug;

use crate::config::MonitorConfig;
use crate::error::UploadError;
use crate::http::Transport;
use crate::types::{HealthReport, HttpResponse, MultipartFile, UploadResponse, UploadResult, Uploaded};

const IMAGE_FIELD: &str = "image";
const IMAGE_MIME: &str = "image/png";
const MAX_BODY_CHARS: usize = 200;

/// Posts clipboard images to `{base}/upload` and probes `{base}/health`.
pub struct Uploader<T> {
    transport: T,
    base_url: String,
    upload_timeout: Duration,
    probe_timeout: Duration,
    max_upload_bytes: usize,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T, config: &MonitorConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            upload_timeout: config.upload_timeout,
            probe_timeout: config.probe_timeout,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn upload_endpoint(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    pub fn health_endpoint(&self) -> String {
        format!("{}/health", self.base_url)
    }

    pub fn probe(&self) -> Result<HealthReport, UploadError> {
        let response = self
            .transport
            .get(&self.health_endpoint(), self.probe_timeout)?;
        if response.status != 200 {
            return Err(UploadError::Rejected {
                status: response.status,
                body: truncate_body(&response.body),
            });
        }
        // Any 200 counts; the body is informational.
        Ok(serde_json::from_str(&response.body).unwrap_or_default())
    }

    /// Uploads PNG bytes under a filename derived from the current local time.
    pub fn upload(&self, bytes: &[u8]) -> UploadResult {
        self.upload_as(upload_file_name(Local::now()), bytes)
    }

    pub fn upload_as(&self, file_name: String, bytes: &[u8]) -> UploadResult {
        if bytes.len() > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        debug!("Uploading {} ({} bytes) to {}", file_name, bytes.len(), self.upload_endpoint());
        let file = MultipartFile {
            field: IMAGE_FIELD,
            file_name: file_name.clone(),
            mime: IMAGE_MIME,
            bytes: bytes.to_vec(),
        };
        let response = self
            .transport
            .post_multipart(&self.upload_endpoint(), file, self.upload_timeout)?;
        parse_upload_response(&response, file_name)
    }
}

/// `clipboard-YYYYMMDD_HHMMSS_mmm.png`
pub fn upload_file_name(now: DateTime<Local>) -> String {
    format!("clipboard-{}.png", now.format("%Y%m%d_%H%M%S_%3f"))
}

fn parse_upload_response(response: &HttpResponse, file_name: String) -> UploadResult {
    if response.status != 200 {
        return Err(UploadError::Rejected {
            status: response.status,
            body: truncate_body(&response.body),
        });
    }

    let body: UploadResponse = serde_json::from_str(&response.body)
        .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
    if !body.success {
        return Err(UploadError::Refused(
            body.error.unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }
    if let Some(stored) = &body.filename {
        debug!("Service stored {} as {}", file_name, stored);
    }

    let path = body
        .path
        .ok_or_else(|| UploadError::InvalidResponse("success without a path".to_string()))?;
    Ok(Uploaded {
        path,
        size: body.size.unwrap_or(0),
        file_name,
    })
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use chrono::TimeZone;

    fn uploader(transport: FakeTransport) -> Uploader<FakeTransport> {
        let config = MonitorConfig {
            base_url: "http://pi.local:7680".to_string(),
            max_upload_bytes: 64,
            ..MonitorConfig::default()
        };
        Uploader::new(transport, &config)
    }

    fn respond(status: u16, body: &str) -> Result<HttpResponse, UploadError> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn file_name_uses_millisecond_timestamp() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 2)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(42))
            .unwrap();
        assert_eq!(upload_file_name(now), "clipboard-20240307_090502_042.png");
    }

    #[test]
    fn successful_upload_sends_png_part() {
        let transport = FakeTransport::new();
        transport.push_upload(respond(
            200,
            r#"{"success":true,"path":"/data/images/pasted-1.png","filename":"pasted-1.png","size":2048}"#,
        ));
        let uploader = uploader(transport);

        let result = uploader.upload_as("clipboard-x.png".to_string(), b"png-bytes");
        assert_eq!(
            result,
            Ok(Uploaded {
                path: "/data/images/pasted-1.png".to_string(),
                size: 2048,
                file_name: "clipboard-x.png".to_string(),
            })
        );

        let posts = uploader.transport().posts();
        assert_eq!(posts.len(), 1);
        let (url, file) = &posts[0];
        assert_eq!(url, "http://pi.local:7680/upload");
        assert_eq!(file.field, "image");
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.file_name, "clipboard-x.png");
        assert_eq!(file.bytes, b"png-bytes");
    }

    #[test]
    fn missing_size_defaults_to_zero() {
        let transport = FakeTransport::new();
        transport.push_upload(respond(200, r#"{"success":true,"path":"/a.png"}"#));
        let uploaded = uploader(transport).upload(b"x").unwrap();
        assert_eq!(uploaded.size, 0);
        assert!(uploaded.file_name.starts_with("clipboard-"));
        assert!(uploaded.file_name.ends_with(".png"));
    }

    #[test]
    fn non_200_status_is_rejected_with_truncated_body() {
        let transport = FakeTransport::new();
        transport.push_upload(respond(502, &"x".repeat(500)));
        let err = uploader(transport).upload(b"x").unwrap_err();
        match err {
            UploadError::Rejected { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.chars().count(), 200);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn success_false_carries_service_error() {
        let transport = FakeTransport::new();
        transport.push_upload(respond(
            200,
            r#"{"success":false,"error":"Only image files are allowed"}"#,
        ));
        assert_eq!(
            uploader(transport).upload(b"x"),
            Err(UploadError::Refused("Only image files are allowed".to_string()))
        );
    }

    #[test]
    fn absent_success_flag_is_unknown_error() {
        let transport = FakeTransport::new();
        transport.push_upload(respond(200, r#"{"path":"/a.png"}"#));
        assert_eq!(
            uploader(transport).upload(b"x"),
            Err(UploadError::Refused("Unknown error".to_string()))
        );
    }

    #[test]
    fn malformed_success_bodies_are_invalid() {
        for body in ["<html>oops</html>", r#"{"success":true}"#] {
            let transport = FakeTransport::new();
            transport.push_upload(respond(200, body));
            assert!(matches!(
                uploader(transport).upload(b"x"),
                Err(UploadError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn transport_errors_pass_through() {
        let transport = FakeTransport::new();
        transport.push_upload(Err(UploadError::Transport("connection refused".to_string())));
        assert_eq!(
            uploader(transport).upload(b"x"),
            Err(UploadError::Transport("connection refused".to_string()))
        );
    }

    #[test]
    fn oversized_images_fail_without_a_request() {
        let uploader = uploader(FakeTransport::new());
        assert_eq!(
            uploader.upload(&[0u8; 65]),
            Err(UploadError::TooLarge { size: 65, limit: 64 })
        );
        assert!(uploader.transport().posts().is_empty());
    }

    #[test]
    fn probe_reads_health_body() {
        let transport = FakeTransport::new();
        transport.set_health(respond(200, r#"{"status":"ok","uploadDir":"/data/images"}"#));
        let uploader = uploader(transport);
        let report = uploader.probe().unwrap();
        assert_eq!(report.status.as_deref(), Some("ok"));
        assert_eq!(report.upload_dir.as_deref(), Some("/data/images"));
        assert_eq!(uploader.transport().gets(), vec!["http://pi.local:7680/health"]);
    }

    #[test]
    fn probe_accepts_any_200_body() {
        let transport = FakeTransport::new();
        transport.set_health(respond(200, "OK"));
        assert_eq!(uploader(transport).probe(), Ok(HealthReport::default()));
    }

    #[test]
    fn probe_fails_on_other_statuses() {
        let transport = FakeTransport::new();
        transport.set_health(respond(404, "not found"));
        assert!(matches!(
            uploader(transport).probe(),
            Err(UploadError::Rejected { status: 404, .. })
        ));
    }
}
