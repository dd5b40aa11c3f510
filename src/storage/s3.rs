use std::path::Path;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use super::{resource_type_for, MediaStore, UploadedAsset};
use crate::config::S3Config;

/// S3-compatible bucket (AWS or MinIO) served from a public base URL.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3Store {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }
}

pub(crate) fn object_key(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!("media/{}.{}", Uuid::new_v4(), ext)
}

#[async_trait]
impl MediaStore for S3Store {
    async fn upload(
        &self,
        body: Bytes,
        file_name: &str,
        content_type: &str,
    ) -> anyhow::Result<UploadedAsset> {
        let key = object_key(file_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(key = %key, "s3 object stored");

        Ok(UploadedAsset {
            url: format!("{}/{}", self.public_url, key),
            public_id: key,
            resource_type: resource_type_for(content_type).to_string(),
        })
    }

    async fn delete(&self, asset: &UploadedAsset) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&asset.public_id)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {}", asset.public_id))?;
        Ok(())
    }
}
