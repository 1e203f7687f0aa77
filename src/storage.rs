use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::AppConfig;

/// Storage path for a user's uploaded profile photo. Re-uploads overwrite it.
pub fn profile_photo_key(uid: &str) -> String {
    format!("profilePhotos/{uid}")
}

/// Content type from a file name's extension. Unknown or missing
/// extensions fall back to PNG.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Object storage backed by the local filesystem.
///
/// Each object is written next to a `.content-type` sidecar so it can be
/// served back with the type it was uploaded as.
#[derive(Clone, Debug)]
pub struct Storage {
    dir: PathBuf,
    public_url: String,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.storage_dir)?;
        tracing::info!("Local storage initialized at {}", config.storage_dir);
        Ok(Self::new(&config.storage_dir, &config.storage_public_url))
    }

    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid storage key '{key}'"),
            ));
        }
        Ok(self.dir.join(relative))
    }

    /// Store an object and return a durable download URL for it.
    ///
    /// The URL carries a fresh token so clients holding the old URL of an
    /// overwritten object refetch it.
    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> io::Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tokio::fs::write(sidecar(&path), content_type).await?;

        tracing::debug!(key, size = data.len(), content_type, "Object stored");
        Ok(format!(
            "{}/{}?token={}",
            self.public_url,
            key,
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Load an object and its content type.
    pub async fn download(&self, key: &str) -> io::Result<(Vec<u8>, String)> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path).await?;
        let content_type = tokio::fs::read_to_string(sidecar(&path))
            .await
            .unwrap_or_else(|_| content_type_for(key).to_string());
        Ok((data, content_type))
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".content-type");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("me.jpg"), "image/jpeg");
        assert_eq!(content_type_for("me.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("me.png"), "image/png");
        assert_eq!(content_type_for("anim.gif"), "image/gif");
        assert_eq!(content_type_for("pic.webp"), "image/webp");
        assert_eq!(content_type_for("scan.bmp"), "image/png");
        assert_eq!(content_type_for("noext"), "image/png");
    }

    #[tokio::test]
    async fn upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), "http://files.test/");

        let url = storage
            .upload(&profile_photo_key("u1"), b"jpegbytes", "image/jpeg")
            .await
            .unwrap();
        assert!(url.starts_with("http://files.test/profilePhotos/u1?token="));

        let (data, content_type) = storage.download("profilePhotos/u1").await.unwrap();
        assert_eq!(data, b"jpegbytes");
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn reupload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), "http://files.test");
        storage.upload("profilePhotos/u1", b"old", "image/png").await.unwrap();
        storage.upload("profilePhotos/u1", b"new", "image/gif").await.unwrap();

        let (data, content_type) = storage.download("profilePhotos/u1").await.unwrap();
        assert_eq!(data, b"new");
        assert_eq!(content_type, "image/gif");
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), "http://files.test");
        assert!(storage.upload("../escape", b"x", "image/png").await.is_err());
        assert!(storage.download("/etc/passwd").await.is_err());
    }
}
