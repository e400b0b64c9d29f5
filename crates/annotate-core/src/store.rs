//! Filesystem blob store
//!
//! Documents live under `<root>/uploads/<key>` (originals) and
//! `<root>/output/<key>` (derived artifacts). Every write is a full
//! replacement: bytes go to a staging file in the same directory which is
//! then renamed over the target, so readers never observe a torn file.
//! Concurrent writers to the same key race and the last rename wins.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::error::StoreError;

/// Longest key accepted, matching common filesystem name limits
const MAX_KEY_LEN: usize = 255;

/// Suffix for in-flight writes
const STAGING_SUFFIX: &str = ".staging";

/// Storage partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Verbatim uploaded documents
    Original,
    /// Rendered annotation artifacts
    Derived,
}

impl Partition {
    /// Directory name under the store root
    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Original => "uploads",
            Partition::Derived => "output",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A filename that is safe to use as a single path segment inside a partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Validate a client-supplied filename.
    ///
    /// Rejects anything that could resolve outside the partition directory
    /// (separators, `..`, absolute paths, drive prefixes) as well as empty
    /// names, hidden names and control characters.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let reject = |reason: &'static str| StoreError::InvalidKey {
            key: raw.to_string(),
            reason,
        };

        if raw.is_empty() {
            return Err(reject("filename is empty"));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(reject("filename is too long"));
        }
        if raw.contains(['/', '\\']) {
            return Err(reject("path separators are not allowed"));
        }
        if raw.starts_with('.') {
            return Err(reject("filename must not start with '.'"));
        }
        if raw.chars().any(char::is_control) {
            return Err(reject("control characters are not allowed"));
        }

        // Catches platform-specific prefixes such as `C:` on Windows
        let mut components = Path::new(raw).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(Self(raw.to_string())),
            _ => Err(reject("filename must be a single path segment")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Filesystem-backed document storage
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    io_timeout: Option<Duration>,
}

impl BlobStore {
    /// Create a store rooted at `root`. Partition directories are created
    /// lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            io_timeout: None,
        }
    }

    /// Bound every filesystem operation by `limit`
    pub fn with_io_timeout(mut self, limit: Duration) -> Self {
        self.io_timeout = Some(limit);
        self
    }

    fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.dir_name())
    }

    /// Write `bytes` to `partition/key`, replacing any existing document.
    ///
    /// The write runs to completion on the blocking pool even when the io
    /// timeout fires first, so a staging file is always either renamed into
    /// place or removed.
    pub async fn put(&self, partition: Partition, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let key = DocumentKey::parse(key)?;
        let dir = self.partition_dir(partition);
        let target = dir.join(key.as_str());
        // Fixed length so any valid key leaves room for the staging name
        let staging = dir.join(format!(".{}{}", Uuid::new_v4().simple(), STAGING_SUFFIX));

        let data = bytes.to_vec();
        let task = tokio::task::spawn_blocking(move || replace_file(&dir, &staging, &target, &data));

        self.bounded(async move {
            match task.await {
                Ok(result) => result.map_err(StoreError::from),
                Err(e) => Err(StoreError::Io(io::Error::other(e))),
            }
        })
        .await?;

        tracing::debug!(%partition, key = %key, bytes = bytes.len(), "Stored document");
        Ok(())
    }

    /// Read the full content of `partition/key`
    pub async fn get(&self, partition: Partition, key: &str) -> Result<Vec<u8>, StoreError> {
        let key = DocumentKey::parse(key)?;
        let path = self.partition_dir(partition).join(key.as_str());

        self.bounded(async {
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                    partition,
                    key: key.to_string(),
                }),
                Err(e) => Err(StoreError::from(e)),
            }
        })
        .await
    }

    /// Whether `partition/key` currently holds a document
    pub async fn exists(&self, partition: Partition, key: &str) -> Result<bool, StoreError> {
        let key = DocumentKey::parse(key)?;
        let path = self.partition_dir(partition).join(key.as_str());

        self.bounded(async {
            match tokio::fs::metadata(&path).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::from(e)),
            }
        })
        .await
    }

    /// Keys stored in `partition`, sorted. A partition that was never
    /// written to is empty.
    pub async fn list(&self, partition: Partition) -> Result<Vec<DocumentKey>, StoreError> {
        let dir = self.partition_dir(partition);

        self.bounded(async {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut keys = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                let name = entry.file_name();
                // Staging files and anything not written through `put` are skipped
                if let Some(key) = name.to_str().and_then(|n| DocumentKey::parse(n).ok()) {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok::<_, StoreError>(keys)
        })
        .await
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => op.await,
        }
    }
}

/// Write to `staging` and rename it over `target`, removing the staging
/// file on failure
fn replace_file(dir: &Path, staging: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let result = std::fs::write(staging, bytes).and_then(|()| std::fs::rename(staging, target));
    if result.is_err() {
        let _ = std::fs::remove_file(staging);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_key_accepts_plain_filenames() {
        for name in ["doc.pdf", "Quarterly Report (final).pdf", "a", "résumé.pdf", "x..y.pdf"] {
            assert!(DocumentKey::parse(name).is_ok(), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_key_rejects_traversal_and_separators() {
        for name in [
            "",
            ".",
            "..",
            "../etc/passwd",
            "..\\boot.ini",
            "/etc/passwd",
            "dir/doc.pdf",
            ".hidden",
            "doc\0.pdf",
            "line\nbreak.pdf",
        ] {
            let err = DocumentKey::parse(name).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidKey { .. }),
                "{:?} should be rejected as invalid",
                name
            );
        }
    }

    #[test]
    fn test_key_rejects_overlong_names() {
        let name = "a".repeat(MAX_KEY_LEN + 1);
        assert!(DocumentKey::parse(&name).is_err());
        assert!(DocumentKey::parse(&"a".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let (_dir, store) = temp_store();
        store.put(Partition::Original, "doc.pdf", b"%PDF-1.4 hello").await.unwrap();

        let bytes = store.get(Partition::Original, "doc.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 hello");
    }

    #[tokio::test]
    async fn test_put_creates_partition_directory() {
        let (dir, store) = temp_store();
        assert!(!dir.path().join("output").exists());

        store.put(Partition::Derived, "doc.pdf", b"x").await.unwrap();
        assert!(dir.path().join("output").join("doc.pdf").is_file());
    }

    #[tokio::test]
    async fn test_partitions_are_separate() {
        let (_dir, store) = temp_store();
        store.put(Partition::Original, "doc.pdf", b"original").await.unwrap();

        let err = store.get(Partition::Derived, "doc.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { partition: Partition::Derived, .. }));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store.get(Partition::Original, "nothing.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_residual_bytes() {
        let (_dir, store) = temp_store();
        store.put(Partition::Derived, "doc.pdf", &[7u8; 4096]).await.unwrap();
        store.put(Partition::Derived, "doc.pdf", b"short").await.unwrap();

        let bytes = store.get(Partition::Derived, "doc.pdf").await.unwrap();
        assert_eq!(bytes, b"short");
    }

    #[tokio::test]
    async fn test_traversal_is_rejected_before_touching_disk() {
        let (dir, store) = temp_store();
        let err = store.put(Partition::Original, "../escape.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert!(!dir.path().join("escape.pdf").exists());
        assert!(!dir.path().join("uploads").exists());

        let err = store.get(Partition::Original, "../escape.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_list_skips_staging_files() {
        let (dir, store) = temp_store();
        store.put(Partition::Original, "b.pdf", b"b").await.unwrap();
        store.put(Partition::Original, "a.pdf", b"a").await.unwrap();
        std::fs::write(dir.path().join("uploads").join(".a.pdf.123.staging"), b"partial").unwrap();

        let keys: Vec<String> = store
            .list(Partition::Original)
            .await
            .unwrap()
            .into_iter()
            .map(DocumentKey::into_string)
            .collect();
        assert_eq!(keys, vec!["a.pdf".to_string(), "b.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_list_of_unused_partition_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.list(Partition::Derived).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_longest_valid_key_round_trips() {
        let (dir, store) = temp_store();
        let key = format!("{}.pdf", "a".repeat(MAX_KEY_LEN - 4));
        assert!(DocumentKey::parse(&key).is_ok());

        store.put(Partition::Original, &key, b"long name").await.unwrap();
        assert_eq!(store.get(Partition::Original, &key).await.unwrap(), b"long name");
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_put_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).with_io_timeout(Duration::from_nanos(1));

        let result = store.put(Partition::Derived, "doc.pdf", &vec![1u8; 1 << 20]).await;
        assert!(
            matches!(result, Ok(()) | Err(StoreError::Timeout(_))),
            "unexpected result {:?}",
            result
        );

        // The write keeps running on the blocking pool after a timeout
        let output = dir.path().join("output");
        let mut leftover: Vec<String> = Vec::new();
        for _ in 0..200 {
            leftover = std::fs::read_dir(&output)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                        .filter(|name| name.ends_with(STAGING_SUFFIX))
                        .collect()
                })
                .unwrap_or_default();
            if leftover.is_empty() && output.join("doc.pdf").exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(leftover.is_empty(), "staging files left behind: {:?}", leftover);
        assert!(output.join("doc.pdf").is_file());
    }

    #[tokio::test]
    async fn test_exists() {
        let (_dir, store) = temp_store();
        assert!(!store.exists(Partition::Original, "doc.pdf").await.unwrap());
        store.put(Partition::Original, "doc.pdf", b"x").await.unwrap();
        assert!(store.exists(Partition::Original, "doc.pdf").await.unwrap());
    }
}
