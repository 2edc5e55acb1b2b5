//! Object storage: flat buckets of keyed blobs.
//!
//! Source documents are read from, and finished RFCs written to, an
//! S3-shaped store behind [`ObjectStore`]. The bundled [`FsObjectStore`]
//! keeps each bucket as a directory under a root, which is enough for the
//! CLI and for tests; an S3 client implements the same trait.
//!
//! Keys are `/`-separated relative paths. Absolute keys and `..` segments
//! are rejected so a key can never leave its bucket directory. Segments
//! starting with `.` are reserved for in-flight uploads, so every key that
//! can be stored is also listed.

use crate::error::RfcError;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Flat object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>, RfcError>;

    /// Every key in `bucket`, sorted.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>, RfcError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, RfcError>;

    /// Create or replace `key`.
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), RfcError>;
}

/// [`ObjectStore`] over a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty bucket; existing buckets are left alone.
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), RfcError> {
        let dir = self.bucket_dir(bucket)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err(bucket, "", e))
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, RfcError> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    async fn existing_bucket_dir(&self, bucket: &str) -> Result<PathBuf, RfcError> {
        let dir = self.bucket_dir(bucket)?;
        match tokio::fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => Ok(dir),
            _ => Err(RfcError::BucketNotFound {
                bucket: bucket.to_string(),
            }),
        }
    }
}

fn storage_err(bucket: &str, key: &str, e: impl std::fmt::Display) -> RfcError {
    RfcError::Storage {
        bucket: bucket.to_string(),
        key: key.to_string(),
        detail: e.to_string(),
    }
}

fn validate_bucket(bucket: &str) -> Result<(), RfcError> {
    let bad = |reason: &str| RfcError::InvalidKey {
        key: bucket.to_string(),
        reason: reason.to_string(),
    };
    if bucket.is_empty() {
        return Err(bad("bucket name is empty"));
    }
    if bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(bad("bucket name must be a single path segment"));
    }
    Ok(())
}

/// Check that `key` is a plain relative path.
pub fn validate_key(key: &str) -> Result<(), RfcError> {
    let bad = |reason: &str| RfcError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(bad("key is empty"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(bad("key must be a relative '/'-separated path"));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(bad("key contains an empty, '.' or '..' segment"));
    }
    if key.split('/').any(|seg| seg.starts_with('.')) {
        return Err(bad("key segments must not start with '.'"));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>, RfcError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("", "", e)),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| storage_err("", "", e))? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                buckets.push(name);
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>, RfcError> {
        let dir = self.existing_bucket_dir(bucket).await?;
        let owned_bucket = bucket.to_string();

        let keys = tokio::task::spawn_blocking(move || -> Result<Vec<String>, RfcError> {
            let mut keys = Vec::new();
            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .follow_links(false)
                .into_iter()
                // In-flight uploads, and anything `validate_key` would refuse.
                .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));
            for entry in walker {
                let entry = entry.map_err(|e| storage_err(&owned_bucket, "", e))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&dir) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| RfcError::Internal(format!("list task panicked: {e}")))??;

        debug!("Bucket '{}': {} objects", bucket, keys.len());
        Ok(keys)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, RfcError> {
        validate_key(key)?;
        let dir = self.existing_bucket_dir(bucket).await?;
        match tokio::fs::read(dir.join(key)).await {
            Ok(bytes) => {
                debug!("Read {}/{} ({} bytes)", bucket, key, bytes.len());
                Ok(bytes)
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
                Err(RfcError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(storage_err(bucket, key, e)),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), RfcError> {
        validate_key(key)?;
        let dir = self.existing_bucket_dir(bucket).await?;
        let path = dir.join(key);
        let (b, k) = (bucket.to_string(), key.to_string());
        let len = bytes.len();

        // Atomic write: temp file in the target directory, then rename.
        tokio::task::spawn_blocking(move || -> Result<(), RfcError> {
            let parent = path.parent().unwrap_or(&dir).to_path_buf();
            std::fs::create_dir_all(&parent).map_err(|e| storage_err(&b, &k, e))?;
            let mut tmp = tempfile::Builder::new()
                .prefix(".upload-")
                .tempfile_in(&parent)
                .map_err(|e| storage_err(&b, &k, e))?;
            tmp.write_all(&bytes).map_err(|e| storage_err(&b, &k, e))?;
            tmp.persist(&path).map_err(|e| storage_err(&b, &k, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| RfcError::Internal(format!("upload task panicked: {e}")))??;

        info!("Uploaded {}/{} ({} bytes)", bucket, key, len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.create_bucket("rfcs").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (_dir, store) = store().await;
        store
            .put_object("rfcs", "team/a_RFC.md", b"# RFC".to_vec())
            .await
            .unwrap();
        assert_eq!(store.get_object("rfcs", "team/a_RFC.md").await.unwrap(), b"# RFC");
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let (_dir, store) = store().await;
        store.put_object("rfcs", "a.md", b"one".to_vec()).await.unwrap();
        store.put_object("rfcs", "a.md", b"two".to_vec()).await.unwrap();
        assert_eq!(store.get_object("rfcs", "a.md").await.unwrap(), b"two");
        assert_eq!(store.list_objects("rfcs").await.unwrap(), vec!["a.md"]);
    }

    #[tokio::test]
    async fn lists_buckets_and_nested_keys_sorted() {
        let (_dir, store) = store().await;
        store.create_bucket("docs").await.unwrap();
        store.put_object("rfcs", "z.md", vec![]).await.unwrap();
        store.put_object("rfcs", "a/b.md", vec![]).await.unwrap();
        assert_eq!(store.list_buckets().await.unwrap(), vec!["docs", "rfcs"]);
        assert_eq!(store.list_objects("rfcs").await.unwrap(), vec!["a/b.md", "z.md"]);
    }

    #[tokio::test]
    async fn missing_bucket_and_key() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.list_objects("nope").await,
            Err(RfcError::BucketNotFound { .. })
        ));
        assert!(matches!(
            store.put_object("nope", "a.md", vec![]).await,
            Err(RfcError::BucketNotFound { .. })
        ));
        assert!(matches!(
            store.get_object("rfcs", "missing.md").await,
            Err(RfcError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store().await;
        for key in ["../escape.md", "/etc/passwd", "a/../../b", "a//b", ""] {
            assert!(
                matches!(store.get_object("rfcs", key).await, Err(RfcError::InvalidKey { .. })),
                "key {key:?}"
            );
        }
        assert!(matches!(
            store.list_objects("..").await,
            Err(RfcError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn dot_keys_are_refused_so_listing_shows_every_stored_key() {
        let (dir, store) = store().await;
        for key in [".draft.md", "team/.hidden/a.md", ".upload-x"] {
            assert!(
                matches!(
                    store.put_object("rfcs", key, vec![]).await,
                    Err(RfcError::InvalidKey { .. })
                ),
                "key {key:?}"
            );
        }

        store.put_object("rfcs", "team/a.v2.md", vec![]).await.unwrap();
        std::fs::create_dir_all(dir.path().join("rfcs/.cache")).unwrap();
        std::fs::write(dir.path().join("rfcs/.cache/x.md"), b"").unwrap();
        std::fs::write(dir.path().join("rfcs/.upload-abc"), b"").unwrap();
        assert_eq!(store.list_objects("rfcs").await.unwrap(), vec!["team/a.v2.md"]);
    }

    #[tokio::test]
    async fn missing_root_has_no_buckets() {
        let store = FsObjectStore::new("/nonexistent/rfc-store-root");
        assert!(store.list_buckets().await.unwrap().is_empty());
    }
}
