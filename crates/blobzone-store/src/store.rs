use std::sync::Arc;

use blobzone_types::{
    ContentHasher, ContentId, KeyGenerator, RandomKeyGenerator, StagingKey, ZonePath,
};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, ObjectBackend, WritePolicy};
use crate::config::StoreConfig;
use crate::content::{BlobContent, BlobReader};
use crate::copy::{await_copy, CopyOutcome};
use crate::error::{StoreError, StoreResult};

/// Read size when re-hashing staged content.
const VERIFY_CHUNK: usize = 64 * 1024;

/// Content-addressed blob store over an object-storage backend.
///
/// Content moves through three zones of one container: staged uploads under
/// `tmp/`, committed blobs under `blocks/`, and withdrawn blobs under
/// `quarantine/`. The store keeps no state between calls; every decision is
/// made against the backend, so any number of tasks (or processes) may share
/// a container.
pub struct BlobStore {
    backend: Arc<dyn ObjectBackend>,
    keys: Arc<dyn KeyGenerator>,
    config: StoreConfig,
}

/// How a move ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MoveOutcome {
    Moved,
    /// Destination was already present; only the source was removed.
    Deduplicated,
}

impl BlobStore {
    /// Create a store using random staging keys.
    pub fn new(backend: Arc<dyn ObjectBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            keys: Arc::new(RandomKeyGenerator),
            config,
        }
    }

    /// Replace the staging key generator.
    pub fn with_key_generator(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Upload content to the staging zone under a fresh key.
    ///
    /// The key is only returned once the upload has succeeded.
    pub async fn put_temp(&self, content: impl Into<BlobContent>) -> StoreResult<StagingKey> {
        let key = self.keys.generate();
        let path = ZonePath::staging(&key);
        self.upload(&path, content.into(), WritePolicy::IfAbsent)
            .await?;
        debug!(backend = self.backend.name(), %path, "staged upload");
        Ok(key)
    }

    /// Write content straight into the store zone, replacing any existing object.
    ///
    /// The caller vouches that `id` matches the content; nothing is re-hashed.
    pub async fn put_permanent(
        &self,
        id: &ContentId,
        content: impl Into<BlobContent>,
    ) -> StoreResult<()> {
        let path = ZonePath::stored(id);
        self.upload(&path, content.into(), WritePolicy::Overwrite)
            .await?;
        debug!(backend = self.backend.name(), %path, "stored directly");
        Ok(())
    }

    /// Commit staged content under its identifier.
    ///
    /// If the store already holds `id`, the staged copy is deleted and the
    /// stored object is left untouched. Otherwise the staged object is moved
    /// into the store. The copy into the store only succeeds if nothing is
    /// there yet, so concurrent commits of the same identifier perform one
    /// data transfer between them and the rest reduce to cleanup.
    ///
    /// An identifier held in quarantine is refused with
    /// [`StoreError::Quarantined`] and the staged object is kept; it only
    /// returns to the store through [`unquarantine`](Self::unquarantine). A
    /// quarantine that races the commit is not excluded.
    pub async fn make_permanent(&self, key: &StagingKey, id: &ContentId) -> StoreResult<()> {
        let staged = ZonePath::staging(key);
        let stored = ZonePath::stored(id);

        if self.config.verify_on_commit {
            self.verify_staged(&staged, id).await?;
        }

        if self.has_quarantined(id).await? {
            warn!(%id, %staged, "refusing to commit quarantined blob");
            return Err(StoreError::Quarantined(*id));
        }

        if self.has_stored(id).await? {
            let removed = self.remove(&staged).await?;
            info!(%id, %staged, removed, "already stored; discarded staged copy");
            return Ok(());
        }

        match self.move_object(&staged, &stored, WritePolicy::IfAbsent).await? {
            MoveOutcome::Moved => debug!(%id, %staged, "committed"),
            MoveOutcome::Deduplicated => {
                info!(%id, %staged, "lost commit race; discarded staged copy")
            }
        }
        Ok(())
    }

    /// Delete a staged object without committing it. Absent keys succeed.
    pub async fn discard_temp(&self, key: &StagingKey) -> StoreResult<()> {
        let path = ZonePath::staging(key);
        let removed = self.remove(&path).await?;
        debug!(%path, removed, "discarded staged upload");
        Ok(())
    }

    /// Move a stored blob into quarantine.
    pub async fn quarantine(&self, id: &ContentId) -> StoreResult<()> {
        let from = ZonePath::stored(id);
        let to = ZonePath::quarantined(id);
        self.move_object(&from, &to, WritePolicy::Overwrite).await?;
        info!(%id, "quarantined");
        Ok(())
    }

    /// Return a quarantined blob to the store.
    pub async fn unquarantine(&self, id: &ContentId) -> StoreResult<()> {
        let from = ZonePath::quarantined(id);
        let to = ZonePath::stored(id);
        self.move_object(&from, &to, WritePolicy::Overwrite).await?;
        info!(%id, "released from quarantine");
        Ok(())
    }

    /// Delete a stored blob.
    ///
    /// Deleting an identifier that is not stored succeeds, so deletes can be
    /// retried freely.
    pub async fn delete(&self, id: &ContentId) -> StoreResult<()> {
        let path = ZonePath::stored(id);
        let removed = self.remove(&path).await?;
        if !removed {
            debug!(%id, "delete of absent blob");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read a stored blob in full.
    pub async fn get_bytes(&self, id: &ContentId) -> StoreResult<Bytes> {
        let path = ZonePath::stored(id);
        let mut reader = self.get_stream(id).await?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StoreError::backend("read", &path, e.into()))?;
        Ok(Bytes::from(buf))
    }

    /// Open a stored blob for incremental reading.
    pub async fn get_stream(&self, id: &ContentId) -> StoreResult<BlobReader> {
        let path = ZonePath::stored(id);
        match self.backend.get(path.as_str()).await {
            Ok(Some(reader)) => Ok(reader),
            Ok(None) => Err(StoreError::BlobNotFound(*id)),
            Err(e) if e.is_not_found() => Err(StoreError::BlobNotFound(*id)),
            Err(e) => Err(StoreError::backend("get", &path, e)),
        }
    }

    /// Whether the store zone holds `id`. Never mutates.
    pub async fn has_stored(&self, id: &ContentId) -> StoreResult<bool> {
        self.exists(&ZonePath::stored(id)).await
    }

    /// Whether the quarantine zone holds `id`. Never mutates.
    pub async fn has_quarantined(&self, id: &ContentId) -> StoreResult<bool> {
        self.exists(&ZonePath::quarantined(id)).await
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    async fn upload(
        &self,
        path: &ZonePath,
        content: BlobContent,
        policy: WritePolicy,
    ) -> StoreResult<()> {
        self.backend
            .put(path.as_str(), content, policy)
            .await
            .map_err(|source| StoreError::BackendWrite {
                path: path.clone(),
                source,
            })
    }

    async fn exists(&self, path: &ZonePath) -> StoreResult<bool> {
        self.backend
            .exists(path.as_str())
            .await
            .map_err(|e| StoreError::backend("exists", path, e))
    }

    async fn remove(&self, path: &ZonePath) -> StoreResult<bool> {
        self.backend
            .delete(path.as_str())
            .await
            .map_err(|e| StoreError::backend("delete", path, e))
    }

    /// Copy `from` to `to`, wait for the copy to finish, then delete `from`.
    ///
    /// The source is deleted only after the backend confirms the copy. A
    /// failure before that point leaves just the source, with any partial
    /// destination discarded; a failure deleting the source leaves both.
    /// Neither loses data.
    async fn move_object(
        &self,
        from: &ZonePath,
        to: &ZonePath,
        policy: WritePolicy,
    ) -> StoreResult<MoveOutcome> {
        let started = match self.backend.copy(from.as_str(), to.as_str(), policy).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => return Err(StoreError::NotFound(from.clone())),
            Err(e) => return Err(StoreError::backend("copy", to, e)),
        };

        let outcome = await_copy(
            self.backend.as_ref(),
            started,
            from,
            to,
            self.config.copy_wait(),
        )
        .await?;

        if let Err(e) = self.backend.delete(from.as_str()).await {
            warn!(%from, %to, error = %e, "copy finished but source delete failed; both remain");
            return Err(StoreError::backend("delete", from, e));
        }

        Ok(match outcome {
            CopyOutcome::Copied => MoveOutcome::Moved,
            CopyOutcome::DestinationExists => MoveOutcome::Deduplicated,
        })
    }

    /// Fail unless the staged bytes hash to `id`.
    async fn verify_staged(&self, staged: &ZonePath, id: &ContentId) -> StoreResult<()> {
        let mut reader = match self.backend.get(staged.as_str()).await {
            Ok(Some(reader)) => reader,
            Ok(None) => return Err(StoreError::NotFound(staged.clone())),
            Err(e) => return Err(StoreError::backend("get", staged, e)),
        };
        let mut hasher = ContentHasher::new(id.algorithm());
        let mut buf = vec![0u8; VERIFY_CHUNK];
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| StoreError::backend("read", staged, BackendError::Io(e)))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let actual = hasher.finalize();
        if actual != *id {
            warn!(expected = %id, %actual, %staged, "staged content does not match identifier");
            return Err(StoreError::ContentMismatch {
                path: staged.clone(),
                expected: *id,
                actual,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}
