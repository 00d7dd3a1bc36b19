//! Local-disk object store for chat attachments.
//!
//! Objects land under `uploads/{chat_id}/{unix_millis}-{name}` below the
//! configured root and are never overwritten. The public URL is what a
//! message's `file_url` should carry; the router serves the root under `/files`.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    public_base: String,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> ObjectStore {
        ObjectStore {
            root: root.into(),
            public_base: format!("{}/files", public_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn put(&self, chat_id: Uuid, file_name: &str, bytes: &[u8]) -> AppResult<StoredObject> {
        let name = sanitize(file_name).ok_or_else(|| AppError::Invalid(format!("unusable file name {file_name:?}")))?;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let path = format!("uploads/{chat_id}/{millis}-{name}");

        let full = self.root.join(&path);
        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => AppError::Conflict(format!("{path} already exists")),
                _ => err.into(),
            })?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::info!(%chat_id, %path, size = bytes.len(), "object stored");
        Ok(StoredObject {
            url: format!("{}/{path}", self.public_base),
            path,
        })
    }
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced by `_`.
fn sanitize(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next()?.trim();
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    match clean.trim_matches('.') {
        "" => None,
        _ => Some(clean),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_flattened() {
        assert_eq!(sanitize("cat.png").as_deref(), Some("cat.png"));
        assert_eq!(sanitize("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize("C:\\My Pics\\holiday 1.jpg").as_deref(), Some("holiday_1.jpg"));
        assert_eq!(sanitize(".."), None);
        assert_eq!(sanitize("dir/"), None);
    }

    #[tokio::test]
    async fn put_scopes_by_chat_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let objects = ObjectStore::new(dir.path(), "http://localhost:8080/");
        let chat_id = Uuid::now_v7();

        let stored = objects.put(chat_id, "cat.png", b"meow").await.unwrap();
        assert!(stored.path.starts_with(&format!("uploads/{chat_id}/")));
        assert!(stored.path.ends_with("-cat.png"));
        assert_eq!(stored.url, format!("http://localhost:8080/files/{}", stored.path));
        assert_eq!(tokio::fs::read(dir.path().join(&stored.path)).await.unwrap(), b"meow");
    }

    #[tokio::test]
    async fn refuses_unusable_names() {
        let dir = tempfile::tempdir().unwrap();
        let objects = ObjectStore::new(dir.path(), "http://localhost:8080");
        let err = objects.put(Uuid::now_v7(), "/", b"x").await.unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }
}
