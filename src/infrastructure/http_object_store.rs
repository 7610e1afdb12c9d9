//! Object store client for an unsigned-upload image host
//!
//! Each upload is a multipart POST to `{base_url}/{cloud_name}/image/upload`
//! carrying the file bytes and the upload preset. Requests share one
//! rate limiter.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderValue, USER_AGENT},
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::debug;

use crate::domain::errors::TransportError;
use crate::domain::image_asset::{FileHandle, UploadedObject};
use crate::domain::repositories::ObjectStore;
use crate::infrastructure::config::ObjectStoreConfig;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct HttpObjectStore {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    upload_url: String,
    config: ObjectStoreConfig,
}

impl HttpObjectStore {
    pub fn new(config: ObjectStoreConfig) -> Result<Self> {
        if config.cloud_name.trim().is_empty() {
            anyhow::bail!("object_store.cloud_name is not configured");
        }
        if config.upload_preset.trim().is_empty() {
            anyhow::bail!("object_store.upload_preset is not configured");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers);
        // Local test servers must not be routed through an environment proxy.
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder.build().context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        let upload_url = upload_url(&config);
        url::Url::parse(&upload_url)
            .with_context(|| format!("Invalid object store upload URL: {upload_url}"))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            upload_url,
            config,
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    fn form_for(&self, file: &FileHandle) -> Result<Form, TransportError> {
        let part = Part::bytes(file.contents.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| TransportError::Storage(format!("invalid mime type: {e}")))?;

        let mut form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone());
        if let Some(folder) = &self.config.folder {
            form = form.text("folder", folder.clone());
        }
        Ok(form)
    }

    fn client_error(&self, e: reqwest::Error) -> TransportError {
        transport_error(e, Duration::from_secs(self.config.timeout_seconds))
    }
}

fn upload_url(config: &ObjectStoreConfig) -> String {
    format!(
        "{}/{}/image/upload",
        config.base_url.trim_end_matches('/'),
        config.cloud_name
    )
}

/// Map a client-side failure, reporting an elapsed request deadline as a timeout.
fn transport_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else if e.is_decode() {
        TransportError::MalformedResponse(e.to_string())
    } else if let Some(status) = e.status() {
        TransportError::Rejected {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Map a non-success response to a transport error, preferring the
/// provider's own message when the body carries one.
fn error_from_response(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                trimmed.to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Auth(message),
        _ => TransportError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_upload_response(body: &str) -> Result<UploadedObject, TransportError> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::MalformedResponse(format!("upload response: {e}")))?;
    Ok(UploadedObject {
        url: parsed.secure_url,
        public_id: parsed.public_id,
    })
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, file: &FileHandle) -> Result<UploadedObject, TransportError> {
        self.rate_limiter.until_ready().await;

        debug!("Uploading {} ({} bytes)", file.name, file.size());
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(self.form_for(file)?)
            .send()
            .await
            .map_err(|e| self.client_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.client_error(e))?;
        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        let uploaded = parse_upload_response(&body)?;
        debug!("Uploaded {} as {}", file.name, uploaded.public_id);
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    fn configured() -> ObjectStoreConfig {
        ObjectStoreConfig {
            cloud_name: "demo".into(),
            upload_preset: "unsigned".into(),
            ..ObjectStoreConfig::default()
        }
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(HttpObjectStore::new(ObjectStoreConfig::default()).is_err());

        let config = ObjectStoreConfig {
            max_requests_per_second: 0,
            ..configured()
        };
        assert!(HttpObjectStore::new(config).is_err());

        let config = ObjectStoreConfig {
            base_url: "not a url".into(),
            ..configured()
        };
        assert!(HttpObjectStore::new(config).is_err());
    }

    #[test]
    fn test_upload_url() {
        let store = HttpObjectStore::new(ObjectStoreConfig {
            base_url: "https://images.example.com/v1/".into(),
            ..configured()
        })
        .unwrap();
        assert_eq!(
            store.upload_url(),
            "https://images.example.com/v1/demo/image/upload"
        );
    }

    #[test]
    fn test_parse_success_body() {
        let body = r#"{"public_id":"catalog/abc","secure_url":"https://cdn/abc.jpg","bytes":12}"#;
        let uploaded = parse_upload_response(body).unwrap();
        assert_eq!(uploaded.public_id, "catalog/abc");
        assert_eq!(uploaded.url, "https://cdn/abc.jpg");

        assert!(matches!(
            parse_upload_response("{}"),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"error":{"message":"Upload preset not found"}}"#;
        assert_eq!(
            error_from_response(StatusCode::BAD_REQUEST, body),
            TransportError::Rejected {
                status: 400,
                message: "Upload preset not found".into()
            }
        );
        assert_eq!(
            error_from_response(StatusCode::UNAUTHORIZED, body),
            TransportError::Auth("Upload preset not found".into())
        );
        assert_eq!(
            error_from_response(StatusCode::BAD_GATEWAY, ""),
            TransportError::Rejected {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn test_form_rejects_invalid_mime() {
        let store = HttpObjectStore::new(configured()).unwrap();
        let file = FileHandle::new("a.png", vec![1, 2, 3]).with_mime_type("not a mime");
        assert!(store.form_for(&file).is_err());
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Read one HTTP request, headers and body, off `socket`.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end].lines().find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                });
                let complete = match content_length {
                    Some(len) => buf.len() >= header_end + 4 + len,
                    None => text.ends_with("0\r\n\r\n") || text.ends_with("--\r\n"),
                };
                if complete {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Accept one connection on a local port and answer it with `response`.
    /// With no response the connection is held open without replying.
    async fn serve_once(response: Option<String>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);
            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(10)).await,
            }
        });

        (base_url, rx)
    }

    fn local(base_url: String) -> ObjectStoreConfig {
        ObjectStoreConfig {
            base_url,
            folder: Some("catalog".into()),
            ..configured()
        }
    }

    #[tokio::test]
    async fn test_upload_posts_multipart_and_parses_result() {
        let body = r#"{"public_id":"catalog/front","secure_url":"https://cdn.example.com/catalog/front.jpg"}"#;
        let (base_url, request) = serve_once(Some(http_response("200 OK", body))).await;
        let store = HttpObjectStore::new(local(base_url)).unwrap();

        let uploaded = store
            .upload(&FileHandle::new("front.jpg", b"not really a jpeg".to_vec()))
            .await
            .unwrap();

        assert_eq!(uploaded.public_id, "catalog/front");
        assert_eq!(uploaded.url, "https://cdn.example.com/catalog/front.jpg");

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /demo/image/upload "));
        assert!(request.contains(r#"name="upload_preset""#));
        assert!(request.contains("unsigned"));
        assert!(request.contains(r#"name="folder""#));
        assert!(request.contains(r#"filename="front.jpg""#));
        assert!(request.contains("not really a jpeg"));
    }

    #[tokio::test]
    async fn test_upload_maps_error_status() {
        let body = r#"{"error":{"message":"Invalid upload preset"}}"#;
        let (base_url, _request) =
            serve_once(Some(http_response("401 Unauthorized", body))).await;
        let store = HttpObjectStore::new(local(base_url)).unwrap();

        let err = store
            .upload(&FileHandle::new("front.jpg", vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Auth("Invalid upload preset".into()));
    }

    #[tokio::test]
    async fn test_upload_deadline_is_reported_as_timeout() {
        let (base_url, _request) = serve_once(None).await;
        let store = HttpObjectStore::new(ObjectStoreConfig {
            timeout_seconds: 1,
            ..local(base_url)
        })
        .unwrap();

        let err = store
            .upload(&FileHandle::new("front.jpg", vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Timeout(Duration::from_secs(1)));
    }
}
