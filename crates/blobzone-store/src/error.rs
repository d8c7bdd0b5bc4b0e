use std::time::Duration;

use blobzone_types::{ContentId, ZonePath};

use crate::backend::BackendError;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Read of a store-zone object that does not exist or has no body.
    #[error("blob not found: {0}")]
    BlobNotFound(ContentId),

    /// A zone transition found nothing at its source path.
    #[error("nothing to move at {0}")]
    NotFound(ZonePath),

    /// An upload failed.
    #[error("failed to write {path}: {source}")]
    BackendWrite {
        path: ZonePath,
        #[source]
        source: BackendError,
    },

    /// Any other backend call failed.
    #[error("backend {op} failed on {path}: {source}")]
    Backend {
        op: &'static str,
        path: ZonePath,
        #[source]
        source: BackendError,
    },

    /// The backend aborted a copy.
    #[error("copy from {from} to {to} failed: {reason}")]
    CopyFailed {
        from: ZonePath,
        to: ZonePath,
        reason: String,
    },

    /// A pending copy did not finish within the configured bound.
    #[error("copy from {from} to {to} did not complete within {timeout:?}")]
    CopyTimeout {
        from: ZonePath,
        to: ZonePath,
        timeout: Duration,
    },

    /// A commit named an identifier that is held in quarantine.
    #[error("blob {0} is quarantined")]
    Quarantined(ContentId),

    /// Staged bytes do not hash to the identifier they were committed under.
    #[error("staged content at {path} does not match {expected} (hashes to {actual})")]
    ContentMismatch {
        path: ZonePath,
        expected: ContentId,
        actual: ContentId,
    },
}

impl StoreError {
    /// Returns `true` for the expected-absence kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlobNotFound(_) | Self::NotFound(_))
    }

    pub(crate) fn backend(op: &'static str, path: &ZonePath, source: BackendError) -> Self {
        Self::Backend {
            op,
            path: path.clone(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
