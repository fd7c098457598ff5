// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where uploaded files (avatars, note images) live.
///
/// Keys are relative paths such as `avatars/3_ab12cd.png`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
    /// Public URL under which the API serves the file.
    fn url(&self, key: &str) -> String;
}

/// Files under a directory on the local disk.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    fn url(&self, key: &str) -> String {
        if let Some(name) = key.strip_prefix("avatars/") {
            return format!("/api/user/avatar/{}", name);
        }
        if let Some(name) = key.strip_prefix("note_images/") {
            let token = name.split('.').next().unwrap_or(name);
            return format!("/api/notes/images/{}", token);
        }
        format!("/{}", key)
    }
}

/// Lowercased extension of an uploaded file name if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "webp").then_some(ext)
}

pub fn content_type_for(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.save("avatars/1_x.png", b"png-bytes").await.unwrap();
        assert!(storage.exists("avatars/1_x.png").await.unwrap());
        assert_eq!(storage.load("avatars/1_x.png").await.unwrap(), b"png-bytes");

        storage.delete("avatars/1_x.png").await.unwrap();
        assert!(!storage.exists("avatars/1_x.png").await.unwrap());
        assert!(matches!(
            storage.load("avatars/1_x.png").await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete("avatars/1_x.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        for key in ["../secret", "/etc/passwd", "avatars/../../x", ""] {
            assert!(matches!(
                storage.save(key, b"x").await,
                Err(StorageError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("Me.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("cat.webp").as_deref(), Some("webp"));
        assert_eq!(image_extension("script.svg"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn test_public_urls() {
        let storage = LocalStorage::new("uploads");
        assert_eq!(storage.url("avatars/3_ab.png"), "/api/user/avatar/3_ab.png");
        assert_eq!(storage.url("note_images/f00d.webp"), "/api/notes/images/f00d");
    }
}
