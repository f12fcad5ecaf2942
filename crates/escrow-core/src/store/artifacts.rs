//! Artifact (blob) storage for payment proofs and work files.
//!
//! Uploads yield an opaque retrievable reference. The filesystem backend
//! stands in for a bucket store; when the bucket is absent the fallback
//! wrapper inlines the artifact as a `data:` URL so the flow can proceed,
//! mirroring the transaction-store fallback policy.

use std::fs;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use super::StoreError;

/// Blob-like store yielding a retrievable reference per upload.
pub trait ArtifactStore: Send + Sync {
    /// Stores the bytes under the given relative path and returns a
    /// reference to the stored artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the backing bucket does not
    /// exist, or [`StoreError::Io`] for other failures.
    fn upload(
        &self,
        relative_path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError>;
}

/// Filesystem-backed artifact store rooted at a bucket directory.
///
/// The root must already exist ("provisioned"); a missing root reports the
/// distinguishable unavailable error rather than auto-creating, matching
/// the bucket semantics of the persistence boundary.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Uses an existing bucket directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provisions the bucket directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn provision(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn upload(
        &self,
        relative_path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Unavailable {
                what: format!("artifact bucket {} does not exist", self.root.display()),
            });
        }

        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;

        Ok(path.display().to_string())
    }
}

/// Wrapper that degrades a missing bucket to inline `data:` URLs.
pub struct FallbackArtifactStore {
    inner: Box<dyn ArtifactStore>,
}

impl FallbackArtifactStore {
    /// Wraps a backing artifact store.
    #[must_use]
    pub fn new(inner: Box<dyn ArtifactStore>) -> Self {
        Self { inner }
    }

    /// Encodes bytes as an inline `data:` URL.
    #[must_use]
    pub fn data_url(bytes: &[u8], content_type: &str) -> String {
        format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
    }
}

impl ArtifactStore for FallbackArtifactStore {
    fn upload(
        &self,
        relative_path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        match self.inner.upload(relative_path, bytes, content_type) {
            Ok(reference) => Ok(reference),
            Err(err) if err.is_unavailable() => {
                warn!(
                    path = relative_path,
                    "artifact bucket not provisioned; inlining artifact as data URL"
                );
                Ok(Self::data_url(bytes, content_type))
            }
            Err(err) => Err(err),
        }
    }
}

/// Artifact store that keeps nothing: every upload becomes an inline
/// `data:` URL. Useful for fully in-memory sessions and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineArtifactStore;

impl ArtifactStore for InlineArtifactStore {
    fn upload(
        &self,
        _relative_path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        Ok(FallbackArtifactStore::data_url(bytes, content_type))
    }
}

/// Bucket path for a payment-proof upload.
#[must_use]
pub fn payment_proof_path(record_id: &str, nanos: u128, file_name: &str) -> String {
    let ext = file_name.rsplit_once('.').map_or("bin", |(_, ext)| ext);
    format!("payment-proofs/{record_id}-payment-proof-{nanos}.{ext}")
}

/// Bucket path for a work-file upload.
#[must_use]
pub fn work_file_path(record_id: &str, nanos: u128, file_name: &str) -> String {
    format!("work-files/{record_id}-work-{nanos}-{file_name}")
}
