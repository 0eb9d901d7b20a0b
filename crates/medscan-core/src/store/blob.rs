//! Photo blob storage.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Blob store errors.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("invalid blob id: {0}")]
    InvalidId(String),

    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob store lock poisoned")]
    LockPoisoned,
}

pub type BlobResult<T> = Result<T, BlobError>;

/// An uploaded document photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub id: String,
    /// Declared MIME type of the upload
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Where uploaded photos live.
pub trait BlobStore: Send + Sync {
    /// Load a blob; `None` if it does not exist.
    fn fetch(&self, blob_id: &str) -> BlobResult<Option<Blob>>;

    /// Size of a blob in bytes without necessarily loading it.
    fn byte_size(&self, blob_id: &str) -> BlobResult<Option<u64>> {
        Ok(self.fetch(blob_id)?.map(|blob| blob.byte_size()))
    }
}

/// Blobs held in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, blob: Blob) -> BlobResult<()> {
        self.blobs
            .lock()
            .map_err(|_| BlobError::LockPoisoned)?
            .insert(blob.id.clone(), blob);
        Ok(())
    }

    pub fn remove(&self, blob_id: &str) -> BlobResult<bool> {
        Ok(self
            .blobs
            .lock()
            .map_err(|_| BlobError::LockPoisoned)?
            .remove(blob_id)
            .is_some())
    }
}

impl BlobStore for MemoryBlobStore {
    fn fetch(&self, blob_id: &str) -> BlobResult<Option<Blob>> {
        Ok(self
            .blobs
            .lock()
            .map_err(|_| BlobError::LockPoisoned)?
            .get(blob_id)
            .cloned())
    }
}

/// Blobs stored as files directly under a root directory.
///
/// The blob id is the file name; the content type comes from its extension.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `blob_id`, replacing any existing file.
    pub fn put(&self, blob_id: &str, bytes: &[u8]) -> BlobResult<()> {
        let path = self.path_for(blob_id)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn path_for(&self, blob_id: &str) -> BlobResult<PathBuf> {
        let valid = !blob_id.is_empty()
            && blob_id != "."
            && blob_id != ".."
            && !blob_id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(BlobError::InvalidId(blob_id.to_string()));
        }
        Ok(self.root.join(blob_id))
    }
}

impl BlobStore for DirectoryBlobStore {
    fn fetch(&self, blob_id: &str) -> BlobResult<Option<Blob>> {
        let path = self.path_for(blob_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Blob::new(blob_id, content_type_for(&path), bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn byte_size(&self, blob_id: &str) -> BlobResult<Option<u64>> {
        let path = self.path_for(blob_id)?;
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// MIME type guessed from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryBlobStore::new();
        store
            .put(Blob::new("scan-1", "image/png", vec![1, 2, 3]))
            .unwrap();

        let blob = store.fetch("scan-1").unwrap().unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(store.byte_size("scan-1").unwrap(), Some(3));
        assert_eq!(store.fetch("scan-2").unwrap(), None);

        assert!(store.remove("scan-1").unwrap());
        assert_eq!(store.byte_size("scan-1").unwrap(), None);
    }

    #[test]
    fn test_directory_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(dir.path());
        store.put("ordonnance.HEIC", &[9; 16]).unwrap();

        let blob = store.fetch("ordonnance.HEIC").unwrap().unwrap();
        assert_eq!(blob.content_type, "image/heic");
        assert_eq!(blob.bytes.len(), 16);
        assert_eq!(store.byte_size("ordonnance.HEIC").unwrap(), Some(16));
    }

    #[test]
    fn test_directory_store_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(dir.path());
        assert_eq!(store.fetch("nope.jpg").unwrap(), None);
        assert_eq!(store.byte_size("nope.jpg").unwrap(), None);
    }

    #[test]
    fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(dir.path());
        for id in ["", "..", "../etc/passwd", "a/b.jpg", "a\\b.jpg"] {
            assert!(
                matches!(store.fetch(id), Err(BlobError::InvalidId(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.tif")), "image/tiff");
        assert_eq!(content_type_for(Path::new("a")), "application/octet-stream");
    }
}
