use std::fmt;

use async_trait::async_trait;

use crate::content::{BlobContent, BlobReader};

/// Failure reported by an object-storage adapter.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The path named as a source does not exist.
    #[error("no object at {0}")]
    NotFound(String),

    /// An `IfAbsent` write found the destination already present.
    #[error("object already exists at {0}")]
    AlreadyExists(String),

    /// `poll_copy` was handed an id the backend does not know.
    #[error("unknown copy operation {0}")]
    UnknownCopy(CopyId),

    /// I/O error from the underlying transport or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The service refused or could not handle the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Returns `true` if the error means "the object was not there".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// What a write does when the destination already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePolicy {
    /// Replace the existing object.
    Overwrite,
    /// Leave the existing object alone and report it.
    IfAbsent,
}

/// Handle for a copy the backend is still performing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CopyId(pub String);

impl fmt::Display for CopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a server-side copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyStatus {
    /// Still running; poll again with this id.
    Pending(CopyId),
    /// The destination holds a full copy of the source.
    Complete,
    /// `IfAbsent` was requested and the destination was already present.
    DestinationExists,
    /// The backend gave up; the destination must not be trusted.
    Failed(String),
}

/// Object-storage capability the blob store is written against.
///
/// Paths are `/`-separated keys inside one container. Implementations must
/// be safe to call concurrently; the store relies on the backend's own
/// atomicity for exists, copy and delete and adds no locking of its own.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Short name for log context.
    fn name(&self) -> &str;

    /// Upload `content` to `path`.
    ///
    /// Streams must be consumed as they are written, never buffered whole.
    /// With `WritePolicy::IfAbsent` an existing object yields
    /// `BackendError::AlreadyExists` and is left unchanged.
    async fn put(&self, path: &str, content: BlobContent, policy: WritePolicy)
        -> BackendResult<()>;

    /// Open the object at `path` for reading. `Ok(None)` if absent.
    async fn get(&self, path: &str) -> BackendResult<Option<BlobReader>>;

    /// Check whether an object exists at `path`.
    async fn exists(&self, path: &str) -> BackendResult<bool>;

    /// Start copying `from` to `to`.
    ///
    /// A missing source is `BackendError::NotFound`. Backends that copy
    /// asynchronously return `CopyStatus::Pending`; the destination may be
    /// partially written until `poll_copy` reports `Complete`.
    async fn copy(&self, from: &str, to: &str, policy: WritePolicy) -> BackendResult<CopyStatus>;

    /// Current state of a pending copy.
    async fn poll_copy(&self, id: &CopyId) -> BackendResult<CopyStatus>;

    /// Stop a pending copy so it can no longer land at its destination.
    ///
    /// Whatever the copy already wrote stays in place; callers delete the
    /// destination themselves. Aborting a copy that already finished, or one
    /// the backend no longer knows, is not an error.
    async fn abort_copy(&self, id: &CopyId) -> BackendResult<()>;

    /// Delete the object at `path`. Returns `true` if it existed.
    async fn delete(&self, path: &str) -> BackendResult<bool>;
}
