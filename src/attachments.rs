//! On-disk storage for order attachments. Files are keyed by a random stored name, one folder per order kind.

use crate::error::AppError;
use crate::model::{Attachment, OrderKind};
use axum::body::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest extension kept from an uploaded file name, dot included.
const MAX_EXTENSION_LEN: usize = 16;

/// A file part received with an order form.
#[derive(Clone, Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Clone, Debug)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        AttachmentStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder(&self, kind: OrderKind) -> PathBuf {
        self.root.join(kind.upload_folder())
    }

    /// Path of a stored file; `None` for names this store never generates.
    fn path(&self, kind: OrderKind, stored_file_name: &str) -> Option<PathBuf> {
        is_stored_name(stored_file_name).then(|| self.folder(kind).join(stored_file_name))
    }

    /// Create the per-kind folders.
    pub async fn ensure_folders(&self) -> Result<(), AppError> {
        for kind in [OrderKind::Sales, OrderKind::Purchase] {
            tokio::fs::create_dir_all(self.folder(kind)).await?;
        }
        Ok(())
    }

    /// Write an upload under a fresh random name and describe it.
    pub async fn save(&self, kind: OrderKind, upload: Upload) -> Result<Attachment, AppError> {
        let file_name = base_name(&upload.file_name);
        let stored_file_name = format!("{}{}", Uuid::new_v4(), extension(&file_name));
        let folder = self.folder(kind);
        tokio::fs::create_dir_all(&folder).await?;
        tokio::fs::write(folder.join(&stored_file_name), &upload.bytes).await?;
        tracing::debug!(kind = kind.label(), file = %file_name, stored = %stored_file_name, size = upload.bytes.len(), "attachment stored");
        Ok(Attachment {
            id: Uuid::new_v4(),
            file_name,
            stored_file_name,
            content_type: upload
                .content_type
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            file_size: upload.bytes.len() as i64,
            uploaded_at: Utc::now(),
        })
    }

    /// Best-effort delete. A missing file is fine; other failures are logged, never returned.
    pub async fn remove(&self, kind: OrderKind, stored_file_name: &str) {
        let Some(path) = self.path(kind, stored_file_name) else {
            tracing::warn!(stored = %stored_file_name, "refusing to delete attachment with unexpected name");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "attachment file deleted"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "attachment file already gone")
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete attachment file"),
        }
    }

    pub async fn remove_all(&self, kind: OrderKind, attachments: &[Attachment]) {
        for a in attachments {
            self.remove(kind, &a.stored_file_name).await;
        }
    }

    /// File contents, or `None` when the file is missing.
    pub async fn read(&self, kind: OrderKind, stored_file_name: &str) -> Result<Option<Vec<u8>>, AppError> {
        let Some(path) = self.path(kind, stored_file_name) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Last path component of a client-supplied file name.
fn base_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() {
        "file".to_string()
    } else {
        base.to_string()
    }
}

/// Lowercased extension with its dot, or empty when absent or not plain alphanumeric.
fn extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() < MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

fn is_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, body: &'static [u8]) -> Upload {
        Upload { file_name: name.into(), content_type: None, bytes: Bytes::from_static(body) }
    }

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(extension("Invoice.PDF"), ".pdf");
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension("README"), "");
        assert_eq!(extension(".bashrc"), "");
        assert_eq!(extension("evil.p$p"), "");
        assert_eq!(base_name(r"C:\docs\po.xlsx"), "po.xlsx");
        assert_eq!(base_name("../../etc/passwd"), "passwd");
    }

    #[test]
    fn stored_names_reject_traversal() {
        assert!(is_stored_name("0b6f1e9a-1b7c-4b36-9d51-1f3c2a4e5d6f.pdf"));
        assert!(!is_stored_name("../secret"));
        assert!(!is_stored_name("a/b"));
        assert!(!is_stored_name(""));
    }

    #[tokio::test]
    async fn save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());
        let a = store.save(OrderKind::Sales, upload("quote.PDF", b"%PDF-1.4")).await.unwrap();
        assert_eq!(a.file_name, "quote.PDF");
        assert!(a.stored_file_name.ends_with(".pdf"));
        assert_eq!(a.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(a.file_size, 8);
        assert!(dir.path().join("sales_orders").join(&a.stored_file_name).exists());

        let bytes = store.read(OrderKind::Sales, &a.stored_file_name).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"%PDF-1.4"[..]));
        assert_eq!(store.read(OrderKind::Purchase, &a.stored_file_name).await.unwrap(), None);

        store.remove(OrderKind::Sales, &a.stored_file_name).await;
        assert_eq!(store.read(OrderKind::Sales, &a.stored_file_name).await.unwrap(), None);
        // Removing again is harmless.
        store.remove(OrderKind::Sales, &a.stored_file_name).await;
    }

    #[tokio::test]
    async fn same_name_uploads_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());
        let a = store.save(OrderKind::Purchase, upload("po.txt", b"one")).await.unwrap();
        let b = store.save(OrderKind::Purchase, upload("po.txt", b"two")).await.unwrap();
        assert_ne!(a.stored_file_name, b.stored_file_name);
        assert_eq!(store.read(OrderKind::Purchase, &a.stored_file_name).await.unwrap(), Some(b"one".to_vec()));
    }
}
