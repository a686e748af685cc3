use crate::config::Config;
use crate::errors::{AppError, AppResult};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;

/// Multipart field the image store reads the file from.
const FILE_FIELD: &str = "file";

/// Public URL of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    image_url: Option<String>,
    details: Option<String>,
}

/// Client for the image store's upload endpoint
pub struct ImageHostClient {
    client: Client,
    upload_url: String,
    retrieval_prefix: String,
}

impl ImageHostClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            retrieval_prefix: config.retrieval_prefix.clone(),
        })
    }

    /// Upload one file and return its public URL. No retries.
    pub async fn upload(&self, payload: ImagePayload) -> AppResult<UploadResult> {
        log::info!(
            "Uploading {} ({} bytes) to {}",
            payload.file_name,
            payload.data.len(),
            self.upload_url
        );

        let form = payload.build_form()?;
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        log::debug!(
            "Upload response {} (first 300 chars): {}",
            status,
            &body[..floor_char_boundary(&body, 300)]
        );

        let parsed: UploadResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
            log::warn!("Upload response is not the expected JSON: {}", e);
            UploadResponse::default()
        });

        if status != StatusCode::OK {
            let detail = parsed
                .details
                .unwrap_or_else(|| "unknown error".to_string());
            log::error!("Upload rejected with {}: {}", status, detail);
            return Err(AppError::RemoteRejected { detail });
        }

        match parsed.image_url.filter(|u| !u.is_empty()) {
            Some(image_url) => {
                let url = format!("{}{}", self.retrieval_prefix, image_url);
                log::info!("Upload succeeded: {}", url);
                Ok(UploadResult { url })
            }
            None => Err(AppError::remote_rejected(
                "upload succeeded but no URL returned",
            )),
        }
    }
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut end = std::cmp::min(max, text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// A named byte stream ready to be sent as one multipart file part.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    file_name: String,
    data: Vec<u8>,
    mime_type: &'static str,
}

impl ImagePayload {
    pub fn new(file_name: String, data: Vec<u8>) -> Self {
        let mime_type = mime_type_for(&file_name);
        Self {
            file_name,
            data,
            mime_type,
        }
    }

    /// Read the file's original bytes; `file_name` is the remote name to send.
    pub async fn from_path(file_path: &Path, file_name: String) -> AppResult<Self> {
        let data = tokio::fs::read(file_path).await.map_err(|e| {
            AppError::filesystem(format!("Cannot read {}: {}", file_path.display(), e))
        })?;
        Ok(Self::new(file_name, data))
    }

    pub fn build_form(self) -> AppResult<multipart::Form> {
        let part = multipart::Part::bytes(self.data)
            .file_name(self.file_name)
            .mime_str(self.mime_type)?;

        Ok(multipart::Form::new().part(FILE_FIELD, part))
    }
}

fn mime_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn client_for(server: &ServerGuard) -> ImageHostClient {
        let config = Config {
            upload_url: format!("{}/api/upload", server.url()),
            request_timeout_secs: 5,
            ..Config::default()
        };
        ImageHostClient::new(&config).expect("client")
    }

    fn payload() -> ImagePayload {
        ImagePayload::new("2024-03-abcd1234.png".to_string(), b"fake png bytes".to_vec())
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("2024-03-abcd1234.png"), "image/png");
        assert_eq!(mime_type_for("2024-03-abcd1234.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("2024-03-abcd1234.webp"), "image/webp");
        assert_eq!(mime_type_for("2024-03-abcd1234"), "application/octet-stream");
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 300), 3);
        assert_eq!(floor_char_boundary("图片上传", 4), 3);
    }

    #[tokio::test]
    async fn test_success_builds_public_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/upload")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=.+".to_string()),
            )
            .match_body(Matcher::Regex(
                r#"name="file"; filename="2024-03-abcd1234.png""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "imageUrl": "2024/abcd1234.png" }"#)
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await.expect("upload");

        mock.assert_async().await;
        assert_eq!(
            result.url,
            "https://images.oky.ac.cn/.netlify/images?url=2024/abcd1234.png"
        );
    }

    #[tokio::test]
    async fn test_success_without_image_url_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await;
        match result {
            Err(AppError::RemoteRejected { detail }) => {
                assert_eq!(detail, "upload succeeded but no URL returned")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_with_empty_image_url_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(200)
            .with_body(r#"{ "imageUrl": "" }"#)
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await;
        match result {
            Err(AppError::RemoteRejected { detail }) => {
                assert_eq!(detail, "upload succeeded but no URL returned")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_carries_details() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(500)
            .with_body(r#"{ "details": "disk full" }"#)
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await;
        match result {
            Err(AppError::RemoteRejected { detail }) => assert_eq!(detail, "disk full"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejection_without_details_defaults() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(413)
            .with_body("<html>Payload Too Large</html>")
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await;
        match result {
            Err(AppError::RemoteRejected { detail }) => assert_eq!(detail, "unknown error"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(201)
            .with_body(r#"{ "imageUrl": "2024/abcd1234.png" }"#)
            .create_async()
            .await;

        let result = client_for(&server).upload(payload()).await;
        assert!(matches!(result, Err(AppError::RemoteRejected { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_failure() {
        let config = Config {
            upload_url: "http://127.0.0.1:1/api/upload".to_string(),
            request_timeout_secs: 5,
            ..Config::default()
        };
        let client = ImageHostClient::new(&config).expect("client");

        let result = client.upload(payload()).await;
        assert!(matches!(result, Err(AppError::NetworkFailure { .. })));
    }

    #[tokio::test]
    async fn test_payload_from_missing_file() {
        let result =
            ImagePayload::from_path(Path::new("missing.png"), "2024-03-abcd1234.png".to_string())
                .await;
        assert!(matches!(result, Err(AppError::FilesystemFailure { .. })));
    }
}
