//! Object storage for uploaded images
//!
//! Uploads go to an S3-compatible endpoint (Supabase Storage exposes one)
//! through the AWS SDK. Credentials come from the standard AWS environment
//! variables; the public URL of a stored object is derived from
//! `STORAGE_PUBLIC_URL`.

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::{error, info};

/// Largest accepted upload, in bytes
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint, e.g. `https://<project>.supabase.co/storage/v1/s3`
    pub endpoint: String,
    /// Base URL objects are publicly served from, without trailing slash
    pub public_url: String,
    pub region: String,
}

impl StorageConfig {
    /// # Environment Variables
    /// - `STORAGE_ENDPOINT`: S3-compatible endpoint URL
    /// - `STORAGE_PUBLIC_URL`: public object base URL
    ///   (default: `<endpoint without /s3>/object/public`)
    /// - `STORAGE_REGION`: region name (default: "us-east-1")
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("STORAGE_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("STORAGE_ENDPOINT environment variable not set"))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let public_url = std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/object/public", endpoint.trim_end_matches("/s3"))
        });

        let region = std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        Ok(Self {
            endpoint,
            public_url: public_url.trim_end_matches('/').to_string(),
            region,
        })
    }
}

/// Lowercased extension of an accepted image file name
pub fn image_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// MIME type for an accepted image extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Client for the object store
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    public_url: String,
}

impl ObjectStorage {
    pub async fn new(config: &StorageConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        info!("Object storage client initialized for {}", config.endpoint);

        Self {
            client: Client::from_conf(s3_config),
            public_url: config.public_url.clone(),
        }
    }

    /// Public URL an object will be served from
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_url, bucket, path)
    }

    /// Upload bytes to `bucket/path` and return the public URL
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        info!("Uploading {} bytes to {}/{}", bytes.len(), bucket, path);

        self.client
            .put_object()
            .bucket(bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                error!("Upload to {}/{} failed: {}", bucket, path, e);
                anyhow::anyhow!("Error uploading file: {}", e)
            })?;

        Ok(self.public_url(bucket, path))
    }
}
