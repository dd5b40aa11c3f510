use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{MediaStore, UploadedAsset};

/// Pushes a local file to the media store.
///
/// `None` means "not uploaded": either there was nothing to upload or the upload failed.
/// On failure the local file is removed before returning.
pub async fn upload_local_file(
    store: &dyn MediaStore,
    local_path: Option<&Path>,
) -> Option<UploadedAsset> {
    let path = local_path.filter(|p| !p.as_os_str().is_empty())?;

    match try_upload(store, path).await {
        Ok(asset) => {
            info!(url = %asset.url, "file uploaded to media store");
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(error = %e, path = %path.display(), "could not remove uploaded temp file");
            }
            Some(asset)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "media upload failed");
            if let Err(e) = std::fs::remove_file(path) {
                warn!(error = %e, path = %path.display(), "could not remove temp file");
            }
            None
        }
    }
}

async fn try_upload(store: &dyn MediaStore, path: &Path) -> anyhow::Result<UploadedAsset> {
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin");
    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(mime_from_ext)
        .unwrap_or("application/octet-stream");
    store
        .upload(Bytes::from(body), file_name, content_type)
        .await
}

/// Best-effort removal of remote assets that ended up unused.
pub async fn discard_assets(store: &dyn MediaStore, assets: &[&UploadedAsset]) {
    for asset in assets {
        if let Err(e) = store.delete(asset).await {
            warn!(error = %e, public_id = %asset.public_id, "could not discard remote asset");
        }
    }
}

/// A multipart file written to the temp directory. The file is removed on drop.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "could not remove staged file"),
        }
    }
}

pub async fn stage_file(
    dir: &Path,
    field: &str,
    file_name: Option<&str>,
    content_type: Option<&str>,
    body: Bytes,
) -> anyhow::Result<StagedFile> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create upload dir {}", dir.display()))?;

    let from_name = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| mime_from_ext(e).is_some());
    let ext = from_name
        .or_else(|| content_type.and_then(ext_from_mime).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    let path = dir.join(format!("{}-{}.{}", field, Uuid::new_v4(), ext));
    tokio::fs::write(&path, &body)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(StagedFile { path })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}

fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "mp4" => Some("video/mp4"),
        _ => None,
    }
}
