use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::MediaConfig;

pub mod cloudinary;
pub mod s3;

pub use cloudinary::CloudinaryStore;
pub use s3::S3Store;

/// A file that now lives on the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub url: String,
    pub public_id: String,
    pub resource_type: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads `body`; the resource type is detected from the content type.
    async fn upload(
        &self,
        body: Bytes,
        file_name: &str,
        content_type: &str,
    ) -> anyhow::Result<UploadedAsset>;

    async fn delete(&self, asset: &UploadedAsset) -> anyhow::Result<()>;
}

pub async fn from_config(cfg: &MediaConfig) -> anyhow::Result<Arc<dyn MediaStore>> {
    let store: Arc<dyn MediaStore> = match cfg {
        MediaConfig::Cloudinary(c) => Arc::new(CloudinaryStore::new(c.clone())?),
        MediaConfig::S3(c) => Arc::new(S3Store::new(c).await?),
    };
    Ok(store)
}

/// Media-host resource class for a MIME type.
pub fn resource_type_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    if essence.starts_with("image/") {
        "image"
    } else if essence.starts_with("video/") || essence.starts_with("audio/") {
        "video"
    } else {
        "raw"
    }
}
