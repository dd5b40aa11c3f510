use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::debug;

use super::{MediaStore, UploadedAsset};
use crate::config::CloudinaryConfig;

/// Cloudinary upload API client (signed requests).
#[derive(Clone)]
pub struct CloudinaryStore {
    http: reqwest::Client,
    cfg: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    resource_type: String,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    pub fn new(cfg: CloudinaryConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build cloudinary http client")?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.cfg.api_base.trim_end_matches('/'),
            self.cfg.cloud_name,
            resource_type,
            action
        )
    }

    /// Signature over the sorted `key=value` pairs followed by the API secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.cfg.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn timestamp() -> String {
        OffsetDateTime::now_utc().unix_timestamp().to_string()
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(
        &self,
        body: Bytes,
        file_name: &str,
        content_type: &str,
    ) -> anyhow::Result<UploadedAsset> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&[("timestamp", timestamp.as_str())]);

        let part = Part::bytes(body.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .context("invalid content type")?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.cfg.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let res = self
            .http
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await
            .context("cloudinary upload request")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("cloudinary upload failed with {status}: {text}");
        }

        let parsed: UploadResponse = res
            .json()
            .await
            .context("decode cloudinary upload response")?;
        let url = parsed
            .secure_url
            .or(parsed.url)
            .filter(|u| !u.is_empty())
            .context("cloudinary response has no url")?;
        debug!(public_id = %parsed.public_id, "cloudinary asset stored");

        Ok(UploadedAsset {
            url,
            public_id: parsed.public_id,
            resource_type: parsed.resource_type,
        })
    }

    async fn delete(&self, asset: &UploadedAsset) -> anyhow::Result<()> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&[("public_id", asset.public_id.as_str()), ("timestamp", timestamp.as_str())]);

        let res = self
            .http
            .post(self.endpoint(&asset.resource_type, "destroy"))
            .form(&[
                ("public_id", asset.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.cfg.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .context("cloudinary destroy request")?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("cloudinary destroy failed with {status}");
        }
        let parsed: DestroyResponse = res
            .json()
            .await
            .context("decode cloudinary destroy response")?;
        match parsed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => anyhow::bail!("cloudinary destroy returned {other}"),
        }
    }
}
