//! Remote analysis service.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | upload | `POST /upload-image/`, multipart field `file` | `{filename}` or `{message}` |
//! | analyze | `GET /analyze/{filename}?language=<code>` | `{description}` |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::from_slice;
use tracing::debug;

use crate::config::{CaptureConfig, Language};
use crate::error::{Error, Result};
use crate::identifiers::UploadId;
use crate::protocol::{AnalyzeResponse, UploadResponse};

use super::file::ImageFile;

// ============================================================================
// AnalysisService
// ============================================================================

/// Upload-then-analyze contract of the remote service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Uploads an image.
    ///
    /// A rejection comes back as an [`UploadResponse`] carrying a
    /// `message`; transport failures are errors.
    async fn upload(&self, image: &ImageFile) -> Result<UploadResponse>;

    /// Requests a description of an uploaded image.
    async fn analyze(&self, upload: &UploadId, language: Language) -> Result<AnalyzeResponse>;
}

// ============================================================================
// HttpAnalysisService
// ============================================================================

/// [`AnalysisService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    client: Client,
    config: CaptureConfig,
}

impl HttpAnalysisService {
    /// Creates a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the server URL is unusable
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.base_url()?;
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Decodes a JSON body, treating an unreadable non-2xx body as a
    /// network failure.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await.map_err(network)?;

        match from_slice::<T>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(Error::network(format!("HTTP {status}"))),
            Err(e) => Err(Error::protocol(format!("Unreadable response body: {e}"))),
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn upload(&self, image: &ImageFile) -> Result<UploadResponse> {
        let url = self.config.upload_url()?;
        debug!(%url, name = %image.name, bytes = image.len(), "Uploading image");

        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.name.clone())
            .mime_str(&image.mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        let body: UploadResponse = Self::read_json(response).await?;

        if !status.is_success() && body.message.is_none() {
            return Err(Error::network(format!("HTTP {status}")));
        }
        Ok(body)
    }

    async fn analyze(&self, upload: &UploadId, language: Language) -> Result<AnalyzeResponse> {
        let mut url = self.config.analyze_url(upload)?;
        if language != self.config.language {
            url.query_pairs_mut()
                .clear()
                .append_pair("language", language.code());
        }
        debug!(%url, "Requesting analysis");

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        let body: AnalyzeResponse = Self::read_json(response).await?;

        if !status.is_success() {
            return Err(Error::network(format!("HTTP {status}")));
        }
        Ok(body)
    }
}

fn network(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::network(format!("request timed out: {e}"))
    } else {
        Error::network(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        if text[..header_end].to_ascii_lowercase().contains("transfer-encoding: chunked") {
            return text.ends_with("0\r\n\r\n");
        }
        let length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + length
    }

    fn service(server: String) -> HttpAnalysisService {
        HttpAnalysisService::new(
            CaptureConfig::new()
                .with_server(server)
                .with_request_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    fn jpeg() -> ImageFile {
        ImageFile {
            name: "webcam_frame.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: bytes::Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file() {
        let (server, request) = serve_once("200 OK", r#"{"filename":"webcam_frame.jpg"}"#).await;

        let response = service(server).upload(&jpeg()).await.unwrap();
        assert_eq!(response.filename.as_deref(), Some("webcam_frame.jpg"));

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /upload-image/ "));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains(r#"name="file"; filename="webcam_frame.jpg""#));
        assert!(request.contains("Content-Type: image/jpeg"));
    }

    #[tokio::test]
    async fn test_upload_rejection_body_is_returned() {
        let (server, _request) = serve_once("400 Bad Request", r#"{"message":"bad format"}"#).await;

        let response = service(server).upload(&jpeg()).await.unwrap();
        assert_eq!(response.message.as_deref(), Some("bad format"));
    }

    #[tokio::test]
    async fn test_analyze_passes_language() {
        let (server, request) = serve_once("200 OK", r#"{"description":"A cat"}"#).await;

        let response = service(server)
            .analyze(&UploadId::new("cat 1.jpg"), Language::English)
            .await
            .unwrap();
        assert_eq!(response.description.as_deref(), Some("A cat"));

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /analyze/cat%201.jpg?language=en "));
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let (server, _request) = serve_once("500 Internal Server Error", "oops").await;

        let result = service(server)
            .analyze(&UploadId::new("a.jpg"), Language::French)
            .await;
        assert!(matches!(result, Err(Error::Network { .. })));
    }
}
