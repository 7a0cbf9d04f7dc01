//! # gb-storage-local
//! guestbook/crates/gb-plugins/gb-storage-local/src/lib.rs
//! Local filesystem implementation of `PhotoStore`.
//! Files are written flat under the root and served by the binary under `url_prefix`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gb_core::traits::PhotoStore;
use tokio::fs;
use tracing::debug;

pub struct LocalPhotoStore {
    /// Root directory for all uploads (e.g., "./uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/uploads" or "https://cdn.example.org/uploads")
    url_prefix: String,
}

impl LocalPhotoStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix: String = url_prefix.into();
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Keeps only the final path component so a name cannot escape the root.
    fn target_path(&self, file_name: &str) -> anyhow::Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("invalid photo file name: {file_name:?}"))?;
        Ok(self.root_path.join(name))
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn save_photo(
        &self,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let target = self.target_path(file_name)?;
        fs::create_dir_all(&self.root_path).await?;
        fs::write(&target, &data).await?;
        debug!(path = %target.display(), content_type, bytes = data.len(), "photo written");

        let stored = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        Ok(format!("{}/{}", self.url_prefix, stored))
    }
}
