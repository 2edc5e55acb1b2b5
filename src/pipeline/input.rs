//! Input resolution: turn a user-supplied location into a [`SourceFile`].
//!
//! Three forms are accepted:
//!
//! * a local path,
//! * an `http://` / `https://` URL, downloaded with `reqwest`,
//! * `s3://bucket/key`, read from the configured [`ObjectStore`].
//!
//! The file name is kept alongside the bytes because extraction dispatches
//! on its extension and exports derive their names from its stem.

use crate::error::RfcError;
use crate::model::SourceFile;
use crate::storage::ObjectStore;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Split `s3://bucket/key` into its parts.
pub fn parse_object_uri(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    (!bucket.is_empty() && !key.is_empty()).then_some((bucket, key))
}

/// Resolve `input` to a named byte buffer.
///
/// `store` is required only for `s3://` inputs.
pub async fn resolve_source(
    input: &str,
    timeout_secs: u64,
    store: Option<&dyn ObjectStore>,
) -> Result<SourceFile, RfcError> {
    if is_url(input) {
        return download_url(input, timeout_secs).await;
    }
    if input.starts_with("s3://") {
        let (bucket, key) = parse_object_uri(input).ok_or_else(|| RfcError::InvalidInput {
            input: input.to_string(),
        })?;
        let store = store.ok_or_else(|| {
            RfcError::InvalidConfig(format!("'{input}' needs an object store (set --store-root)"))
        })?;
        let bytes = store.get_object(bucket, key).await?;
        info!("Loaded s3://{}/{} ({} bytes)", bucket, key, bytes.len());
        return Ok(SourceFile::new(key, bytes));
    }
    resolve_local(input).await
}

/// Read a local file.
async fn resolve_local(path_str: &str) -> Result<SourceFile, RfcError> {
    if path_str.trim().is_empty() {
        return Err(RfcError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RfcError::PermissionDenied { path });
        }
        Err(_) => return Err(RfcError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Resolved local source: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, RfcError> {
    info!("Downloading source from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RfcError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            RfcError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RfcError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(RfcError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RfcError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(SourceFile::new(name, bytes.to_vec()))
}

/// Last path segment when it has an extension; otherwise `downloaded.txt`.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return urlencoding::decode(last)
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| last.to_string());
                }
            }
        }
    }

    "downloaded.txt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsObjectStore;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.docx"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("s3://bucket/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn object_uri_parts() {
        assert_eq!(parse_object_uri("s3://rfcs/team/a.md"), Some(("rfcs", "team/a.md")));
        assert_eq!(parse_object_uri("s3://rfcs"), None);
        assert_eq!(parse_object_uri("s3:///a.md"), None);
        assert_eq!(parse_object_uri("s3://rfcs/"), None);
    }

    #[test]
    fn filename_comes_from_last_segment() {
        assert_eq!(filename_from_url("https://x.io/docs/Design%20Doc.docx?dl=1"), "Design Doc.docx");
        assert_eq!(filename_from_url("https://x.io/docs/"), "downloaded.txt");
        assert_eq!(filename_from_url("https://x.io/raw"), "downloaded.txt");
    }

    #[tokio::test]
    async fn local_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes").unwrap();
        let src = resolve_source(path.to_str().unwrap(), 5, None).await.unwrap();
        assert_eq!(src.name, "notes.md");
        assert_eq!(src.bytes, b"# Notes");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_source("/nonexistent/notes.md", 5, None).await.unwrap_err();
        assert!(matches!(err, RfcError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn object_uri_reads_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.create_bucket("docs").await.unwrap();
        store.put_object("docs", "a/notes.txt", b"hello".to_vec()).await.unwrap();

        let src = resolve_source("s3://docs/a/notes.txt", 5, Some(&store)).await.unwrap();
        assert_eq!(src.name, "a/notes.txt");
        assert_eq!(src.stem(), "a/notes");
        assert_eq!(src.bytes, b"hello");

        assert!(resolve_source("s3://docs/a/notes.txt", 5, None).await.is_err());
        assert!(matches!(
            resolve_source("s3://docs", 5, Some(&store)).await,
            Err(RfcError::InvalidInput { .. })
        ));
    }
}
