use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub const IMAGES_BUCKET: &str = "images";

/// An image picked in a form, not uploaded yet.
#[derive(Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.content.len())
            .finish()
    }
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
        }
    }

    /// Object path under `prefix`, unique per upload, keeping the file's
    /// extension when it has a sane one.
    pub fn object_path(&self, prefix: &str) -> String {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "bin".into());
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{prefix}/{}-{}.{extension}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        )
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `content` at `bucket/path` and returns its public URL.
    async fn upload(&self, bucket: &str, path: &str, content: &[u8]) -> Result<Url, AppError>;
}

/// Uploads `image` into the images bucket under `prefix`.
pub async fn upload_image(
    storage: &dyn FileStorage,
    prefix: &str,
    image: &ImageUpload,
) -> Result<Url, AppError> {
    if image.content.is_empty() {
        return Err(AppError::Upload(format!("{} is empty", image.file_name)));
    }
    storage
        .upload(IMAGES_BUCKET, &image.object_path(prefix), &image.content)
        .await
}

/// Buckets are directories below `root`; the router serves `root` under
/// `/storage`, which is where the public URLs point.
#[derive(Clone)]
pub struct LocalStorage {
    root: Arc<PathBuf>,
    public_base: Arc<Url>,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_base: Url) -> Self {
        Self {
            root: Arc::new(root),
            public_base: Arc::new(public_base),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root().join(IMAGES_BUCKET)).await?;
        Ok(())
    }

    fn object_file(&self, bucket: &str, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(bucket).join(path);
        let escapes = relative.components().any(|component| {
            !matches!(component, std::path::Component::Normal(_))
        });
        if escapes {
            return Err(AppError::Upload(format!("invalid object path {bucket}/{path}")));
        }
        Ok(self.root().join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn upload(&self, bucket: &str, path: &str, content: &[u8]) -> Result<Url, AppError> {
        let target = self.object_file(bucket, path)?;
        let upload_failed =
            |err: std::io::Error| AppError::Upload(format!("{bucket}/{path}: {err}"));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(upload_failed)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(upload_failed)?;
        file.write_all(content).await.map_err(upload_failed)?;
        file.flush().await.map_err(upload_failed)?;

        let url = self
            .public_base
            .join(&format!("storage/{bucket}/{path}"))
            .map_err(|err| AppError::Upload(format!("public url for {bucket}/{path}: {err}")))?;
        info!(%url, bytes = content.len(), "file uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn storage(root: PathBuf) -> LocalStorage {
        LocalStorage::new(root, Url::parse("http://localhost:3000/").expect("url"))
    }

    #[test]
    fn object_path_keeps_clean_extensions_only() {
        let upload = ImageUpload::new("Praia.PNG", vec![1]);
        let path = upload.object_path("viagens");
        assert!(path.starts_with("viagens/"));
        assert!(path.ends_with(".png"));

        let odd = ImageUpload::new("no-extension", vec![1]);
        assert!(odd.object_path("viagens").ends_with(".bin"));
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_public_url() {
        let dir = TempDir::new().expect("tempdir");
        let storage = storage(dir.path().to_path_buf());
        let url = storage
            .upload(IMAGES_BUCKET, "viagens/a.png", b"png")
            .await
            .expect("upload");
        assert_eq!(url.as_str(), "http://localhost:3000/storage/images/viagens/a.png");
        let stored = std::fs::read(dir.path().join("images/viagens/a.png")).expect("stored file");
        assert_eq!(stored, b"png");
    }

    #[tokio::test]
    async fn upload_refuses_to_overwrite_or_escape() {
        let dir = TempDir::new().expect("tempdir");
        let storage = storage(dir.path().to_path_buf());
        storage
            .upload(IMAGES_BUCKET, "viagens/a.png", b"one")
            .await
            .expect("first upload");

        let again = storage.upload(IMAGES_BUCKET, "viagens/a.png", b"two").await;
        assert!(matches!(again, Err(AppError::Upload(_))));

        let escape = storage.upload(IMAGES_BUCKET, "../outside.png", b"x").await;
        assert!(matches!(escape, Err(AppError::Upload(_))));
    }

    #[tokio::test]
    async fn empty_images_are_not_uploaded() {
        let dir = TempDir::new().expect("tempdir");
        let storage = storage(dir.path().to_path_buf());
        let result =
            upload_image(&storage, "viagens", &ImageUpload::new("a.png", Vec::new())).await;
        assert!(matches!(result, Err(AppError::Upload(_))));
    }
}
