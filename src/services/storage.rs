use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;

use crate::core::config::Settings;

/// Source of stored entity bytes.
#[async_trait]
pub(crate) trait ObjectStore: Send + Sync {
    /// Writes the object under `key` into `dest`, replacing whatever it holds.
    async fn download_to(&self, key: &str, dest: &Path) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    client: Client,
    bucket: String,
}

impl StorageService {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        if !settings.s3().is_configured() {
            return Ok(None);
        }

        let creds = Credentials::new(
            settings.s3().access_key.clone(),
            settings.s3().secret_key.clone(),
            None,
            None,
            "grader-queue-static",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.s3().region.clone()))
            .credentials_provider(creds);
        if let Some(endpoint) = settings.s3().endpoint.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let client = Client::new(&config);

        Ok(Some(Self { client, bucket: settings.s3().bucket.clone() }))
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn download_to(&self, key: &str, dest: &Path) -> anyhow::Result<u64> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch s3://{}/{key}", self.bucket))?;

        let mut body = object.body.into_async_read();
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to open {}", dest.display()))?;
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .with_context(|| format!("Failed to stream s3://{}/{key}", self.bucket))?;
        file.flush().await?;

        tracing::debug!(key, bytes = written, "Downloaded object");
        Ok(written)
    }
}
