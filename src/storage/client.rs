// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MinioSettings;
use crate::storage::sigv4::{sha256_hex, uri_encode, Signer, UNSIGNED_PAYLOAD};
use crate::storage::traits::{Destination, StorageError, UploadReceipt, Uploader};
use crate::utils::endpoint_url;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// S3-compatible object storage client bound to a single bucket
#[derive(Debug, Clone)]
pub struct MinioClient {
    client: Client,
    base_url: Url,
    bucket: String,
    region: Option<String>,
    signer: Signer,
}

impl MinioClient {
    pub fn new(settings: &MinioSettings) -> Result<Self, StorageError> {
        debug!("Creating object storage client");

        if settings.endpoint.is_empty() {
            return Err(StorageError::MissingSetting("minio.endpoint"));
        }
        if settings.access_key_id.is_empty() {
            return Err(StorageError::MissingSetting("minio.access-key-id"));
        }
        if settings.access_key_secret.is_empty() {
            return Err(StorageError::MissingSetting("minio.access-key-secret"));
        }
        if settings.bucket.is_empty() {
            return Err(StorageError::MissingSetting("minio.bucket"));
        }

        let base_url = endpoint_url(&settings.endpoint, settings.secure)
            .map_err(|e| StorageError::InvalidEndpoint(e.to_string()))?;

        let region = settings.region.clone().filter(|r| !r.is_empty());
        let signer = Signer::new(
            settings.access_key_id.clone(),
            settings.access_key_secret.clone(),
            region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()),
        );

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("minio-backup-sidecar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            bucket: settings.bucket.clone(),
            region,
            signer,
        })
    }

    /// Create the client, make sure the bucket exists and apply the
    /// retention policy if one is configured.
    pub async fn connect(settings: &MinioSettings) -> Result<Self, StorageError> {
        let client = Self::new(settings)?;
        client.ensure_bucket().await?;

        if let Some(days) = settings.retention.filter(|d| *d > 0) {
            client.set_retention(days).await?;
        }

        Ok(client)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn bucket_url(&self, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/{}", uri_encode(&self.bucket, false)));
        url.set_query(query);
        url
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "/{}/{}",
            uri_encode(&self.bucket, false),
            uri_encode(key, true)
        ));
        url
    }

    fn signed_request(
        &self,
        method: Method,
        url: Url,
        extra: &[(&str, &str)],
        payload_hash: &str,
    ) -> RequestBuilder {
        let signed = self
            .signer
            .sign(method.as_str(), &url, extra, payload_hash, chrono::Utc::now());

        let mut request = self.client.request(method, url);
        for (name, value) in extra {
            request = request.header(*name, *value);
        }
        for (name, value) in signed {
            request = request.header(name, value);
        }
        request
    }

    async fn send_signed(
        &self,
        method: Method,
        url: Url,
        extra: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<Response, StorageError> {
        let body = body.unwrap_or_default();
        let payload_hash = sha256_hex(body.as_bytes());
        let response = self
            .signed_request(method, url, extra, &payload_hash)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Create the bucket, or reuse it if it already exists
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        info!(bucket = %self.bucket, "Making bucket");

        let body = match self.region.as_deref() {
            Some(region) if region != DEFAULT_REGION => format!(
                "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                region
            ),
            _ => String::new(),
        };
        let response = self
            .send_signed(Method::PUT, self.bucket_url(None), &[], Some(body))
            .await?;

        if response.status().is_success() {
            info!(bucket = %self.bucket, "Successfully created bucket");
            return Ok(());
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(status = %status, body = %text, "Unable to create bucket");

        // Already owned buckets are reported as a conflict; confirm with a HEAD
        let exists = self
            .send_signed(Method::HEAD, self.bucket_url(None), &[], None)
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);

        if exists {
            info!(bucket = %self.bucket, "Bucket already exists, using it");
            Ok(())
        } else {
            Err(StorageError::CreateBucket {
                bucket: self.bucket.clone(),
                status,
                body: text,
            })
        }
    }

    /// Expire objects in the bucket after `days` days
    pub async fn set_retention(&self, days: u32) -> Result<(), StorageError> {
        info!(bucket = %self.bucket, days, "Setting bucket retention");

        let body = lifecycle_document(days);
        let content_md5 = STANDARD.encode(*md5::compute(body.as_bytes()));

        let response = self
            .send_signed(
                Method::PUT,
                self.bucket_url(Some("lifecycle")),
                &[("content-md5", content_md5.as_str())],
                Some(body),
            )
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Lifecycle { status, body: text });
        }

        info!(bucket = %self.bucket, days, "Set bucket retention policy");
        Ok(())
    }
}

fn lifecycle_document(days: u32) -> String {
    format!(
        "<LifecycleConfiguration><Rule><ID>retention</ID><Status>Enabled</Status>\
         <Filter><Prefix></Prefix></Filter><Expiration><Days>{}</Days></Expiration>\
         </Rule></LifecycleConfiguration>",
        days
    )
}

fn content_type_for(file: &Path, destination: &Destination) -> String {
    if !destination.content_type.is_empty() {
        return destination.content_type.clone();
    }
    mime_guess::from_path(file)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[async_trait]
impl Uploader for MinioClient {
    async fn upload(&self, file: &Path, destination: &Destination) -> Result<UploadReceipt, StorageError> {
        let key = destination.object_key(file);
        let content_type = content_type_for(file, destination);

        let io_err = |source| StorageError::Io {
            path: file.display().to_string(),
            source,
        };
        let handle = tokio::fs::File::open(file).await.map_err(io_err)?;
        let size = handle.metadata().await.map_err(io_err)?.len();

        info!(
            file = %file.display(),
            key = %key,
            content_type = %content_type,
            size,
            "Uploading file"
        );

        // Streamed bodies are not hashed; only host and x-amz-* headers are signed
        let response = self
            .signed_request(Method::PUT, self.object_url(&key), &[], UNSIGNED_PAYLOAD)
            .header(CONTENT_LENGTH, size)
            .header(CONTENT_TYPE, content_type.as_str())
            .body(Body::wrap_stream(ReaderStream::new(handle)))
            .send()
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Upload request failed");
                StorageError::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::PutObject { key, status, body: text });
        }

        info!(key = %key, size, bucket = %self.bucket, "Successfully uploaded file");
        Ok(UploadReceipt { key, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, ServerGuard};
    use tempfile::TempDir;

    async fn setup_mock_server() -> (ServerGuard, MinioSettings) {
        let server = mockito::Server::new_async().await;
        let settings = MinioSettings {
            endpoint: server.host_with_port(),
            access_key_id: "test-access".to_string(),
            access_key_secret: "test-secret".to_string(),
            region: None,
            bucket: "backups".to_string(),
            retention: None,
            secure: false,
        };
        (server, settings)
    }

    #[test]
    fn test_new_requires_settings() {
        let mut settings = MinioSettings::default();
        assert!(matches!(
            MinioClient::new(&settings),
            Err(StorageError::MissingSetting("minio.endpoint"))
        ));

        settings.endpoint = "localhost:9000".to_string();
        assert!(matches!(
            MinioClient::new(&settings),
            Err(StorageError::MissingSetting("minio.access-key-id"))
        ));

        settings.access_key_id = "id".to_string();
        assert!(matches!(
            MinioClient::new(&settings),
            Err(StorageError::MissingSetting("minio.access-key-secret"))
        ));

        settings.access_key_secret = "secret".to_string();
        assert!(matches!(
            MinioClient::new(&settings),
            Err(StorageError::MissingSetting("minio.bucket"))
        ));

        settings.bucket = "b".to_string();
        assert!(MinioClient::new(&settings).is_ok());
    }

    #[test]
    fn test_object_url_encodes_key() {
        let settings = MinioSettings {
            endpoint: "localhost:9000".to_string(),
            access_key_id: "id".to_string(),
            access_key_secret: "secret".to_string(),
            bucket: "backups".to_string(),
            secure: false,
            ..Default::default()
        };
        let client = MinioClient::new(&settings).unwrap();
        let url = client.object_url("logs/app log+1.txt");
        assert_eq!(url.as_str(), "http://localhost:9000/backups/logs/app%20log%2B1.txt");
    }

    #[test]
    fn test_content_type_for() {
        let dest = Destination::default();
        assert_eq!(content_type_for(Path::new("a.json"), &dest), "application/json");
        assert_eq!(content_type_for(Path::new("a.unknownext"), &dest), DEFAULT_CONTENT_TYPE);

        let dest = Destination {
            content_type: "text/csv".to_string(),
            ..Default::default()
        };
        assert_eq!(content_type_for(Path::new("a.json"), &dest), "text/csv");
    }

    #[tokio::test]
    async fn test_upload_success() {
        let (mut server, settings) = setup_mock_server().await;
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        std::fs::write(&file, "hello world").unwrap();

        let mock = server
            .mock("PUT", "/backups/nightly/a.txt")
            .match_header("authorization", Matcher::Regex("^AWS4-HMAC-SHA256 Credential=test-access/".to_string()))
            .match_header("x-amz-content-sha256", UNSIGNED_PAYLOAD)
            .match_body("hello world")
            .with_status(200)
            .create_async()
            .await;

        let client = MinioClient::new(&settings).unwrap();
        let dest = Destination {
            path: "nightly".to_string(),
            ..Default::default()
        };
        let receipt = client.upload(&file, &dest).await.unwrap();

        assert_eq!(receipt.key, "nightly/a.txt");
        assert_eq!(receipt.size, 11);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let (mut server, settings) = setup_mock_server().await;
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        std::fs::write(&file, "data").unwrap();

        let _mock = server
            .mock("PUT", "/backups/a.txt")
            .with_status(403)
            .with_body("AccessDenied")
            .create_async()
            .await;

        let client = MinioClient::new(&settings).unwrap();
        let err = client.upload(&file, &Destination::default()).await.unwrap_err();
        assert!(matches!(err, StorageError::PutObject { .. }));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let (_server, settings) = setup_mock_server().await;
        let client = MinioClient::new(&settings).unwrap();
        let err = client
            .upload(Path::new("/nonexistent/file.txt"), &Destination::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn test_ensure_bucket_created() {
        let (mut server, settings) = setup_mock_server().await;
        let mock = server
            .mock("PUT", "/backups")
            .with_status(200)
            .create_async()
            .await;

        let client = MinioClient::new(&settings).unwrap();
        client.ensure_bucket().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_bucket_already_exists() {
        let (mut server, settings) = setup_mock_server().await;
        let _put = server
            .mock("PUT", "/backups")
            .with_status(409)
            .with_body("BucketAlreadyOwnedByYou")
            .create_async()
            .await;
        let head = server
            .mock("HEAD", "/backups")
            .with_status(200)
            .create_async()
            .await;

        let client = MinioClient::new(&settings).unwrap();
        client.ensure_bucket().await.unwrap();
        head.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_bucket_fails() {
        let (mut server, settings) = setup_mock_server().await;
        let _put = server
            .mock("PUT", "/backups")
            .with_status(403)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/backups")
            .with_status(404)
            .create_async()
            .await;

        let client = MinioClient::new(&settings).unwrap();
        let err = client.ensure_bucket().await.unwrap_err();
        assert!(matches!(err, StorageError::CreateBucket { .. }));
    }

    #[tokio::test]
    async fn test_connect_sets_retention() {
        let (mut server, mut settings) = setup_mock_server().await;
        settings.retention = Some(7);

        let _put = server
            .mock("PUT", "/backups")
            .with_status(200)
            .create_async()
            .await;
        let lifecycle = server
            .mock("PUT", "/backups?lifecycle")
            .match_header("content-md5", Matcher::Any)
            .match_body(Matcher::Regex("<Days>7</Days>".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let client = MinioClient::connect(&settings).await.unwrap();
        assert_eq!(client.bucket(), "backups");
        lifecycle.assert_async().await;
    }
}
