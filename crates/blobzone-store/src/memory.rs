use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::backend::{BackendError, BackendResult, CopyId, CopyStatus, ObjectBackend, WritePolicy};
use crate::content::{BlobContent, BlobReader};

/// Backend call that [`InMemoryBackend::fail_next`] can break.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultPoint {
    /// `put` to the path returns an error; nothing is written.
    Put,
    /// `get` of the path returns an error.
    Get,
    /// `exists` on the path returns an error.
    Exists,
    /// `copy` to the path (destination) is rejected before it starts.
    Copy,
    /// `copy` to the path (destination) starts but ends `Failed`. Nothing is
    /// written unless partial copies are enabled, in which case the partial
    /// destination stays behind.
    CopyAborted,
    /// `delete` of the path returns an error; the object stays.
    Delete,
}

struct PendingCopy {
    data: Bytes,
    to: String,
    policy: WritePolicy,
    remaining_polls: u32,
}

impl PendingCopy {
    /// Policy applied when the copy lands. A copy that already wrote a
    /// partial destination owns it and replaces it.
    fn landing_policy(&self, partial: bool) -> WritePolicy {
        if partial {
            WritePolicy::Overwrite
        } else {
            self.policy
        }
    }
}

/// In-memory, HashMap-based object backend.
///
/// Intended for tests and embedding. Besides plain storage it can simulate a
/// service whose copies complete asynchronously
/// ([`with_deferred_copies`](Self::with_deferred_copies)) and inject one-shot
/// failures at chosen paths ([`fail_next`](Self::fail_next)). Deferred
/// copies can also expose a half-written destination while they run
/// ([`with_partial_copies`](Self::with_partial_copies)), the way remote
/// services do.
pub struct InMemoryBackend {
    objects: RwLock<HashMap<String, Bytes>>,
    copies: Mutex<HashMap<CopyId, PendingCopy>>,
    faults: Mutex<Vec<(FaultPoint, String)>>,
    deferred_polls: u32,
    partial_copies: bool,
    next_copy: AtomicU64,
    completed_copies: AtomicU64,
}

impl InMemoryBackend {
    /// Create a new empty backend whose copies complete immediately.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            copies: Mutex::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
            deferred_polls: 0,
            partial_copies: false,
            next_copy: AtomicU64::new(0),
            completed_copies: AtomicU64::new(0),
        }
    }

    /// Make every copy stay pending until it has been polled `polls` times.
    pub fn with_deferred_copies(mut self, polls: u32) -> Self {
        self.deferred_polls = polls;
        self
    }

    /// While a deferred copy is pending, its destination holds the first
    /// half of the source. Has no effect on copies that complete immediately.
    pub fn with_partial_copies(mut self) -> Self {
        self.partial_copies = true;
        self
    }

    /// Fail the next `point` call that targets `path`, once.
    pub fn fail_next(&self, point: FaultPoint, path: &str) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .push((point, path.to_owned()));
    }

    fn take_fault(&self, point: FaultPoint, path: &str) -> bool {
        let mut faults = self.faults.lock().expect("lock poisoned");
        match faults.iter().position(|(p, f)| *p == point && f == path) {
            Some(i) => {
                faults.remove(i);
                true
            }
            None => false,
        }
    }

    fn injected(point: FaultPoint, path: &str) -> BackendError {
        BackendError::Unavailable(format!("injected {point:?} fault at {path}"))
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if an object exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().expect("lock poisoned").contains_key(path)
    }

    /// Bytes stored at `path`.
    pub fn object(&self, path: &str) -> Option<Bytes> {
        self.objects.read().expect("lock poisoned").get(path).cloned()
    }

    /// Sorted list of all stored paths.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Sorted paths under `prefix/`.
    pub fn paths_in(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{prefix}/");
        self.paths()
            .into_iter()
            .filter(|p| p.starts_with(&prefix))
            .collect()
    }

    /// Copies that wrote their destination since creation.
    pub fn completed_copies(&self) -> u64 {
        self.completed_copies.load(Ordering::SeqCst)
    }

    /// Copies started but not yet finished.
    pub fn pending_copies(&self) -> usize {
        self.copies.lock().expect("lock poisoned").len()
    }

    /// Write `data` to `to` under `policy`; the check and the insert share one lock.
    fn finish_copy(&self, data: Bytes, to: &str, policy: WritePolicy) -> CopyStatus {
        let mut objects = self.objects.write().expect("lock poisoned");
        if policy == WritePolicy::IfAbsent && objects.contains_key(to) {
            return CopyStatus::DestinationExists;
        }
        if self.take_fault(FaultPoint::CopyAborted, to) {
            return CopyStatus::Failed(format!("injected abort copying to {to}"));
        }
        objects.insert(to.to_owned(), data);
        self.completed_copies.fetch_add(1, Ordering::SeqCst);
        CopyStatus::Complete
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        path: &str,
        content: BlobContent,
        policy: WritePolicy,
    ) -> BackendResult<()> {
        if self.take_fault(FaultPoint::Put, path) {
            return Err(Self::injected(FaultPoint::Put, path));
        }
        let data = match content {
            BlobContent::Bytes(b) => b,
            BlobContent::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Bytes::from(buf)
            }
        };
        let mut objects = self.objects.write().expect("lock poisoned");
        if policy == WritePolicy::IfAbsent && objects.contains_key(path) {
            return Err(BackendError::AlreadyExists(path.to_owned()));
        }
        objects.insert(path.to_owned(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> BackendResult<Option<BlobReader>> {
        if self.take_fault(FaultPoint::Get, path) {
            return Err(Self::injected(FaultPoint::Get, path));
        }
        Ok(self
            .object(path)
            .map(|data| Box::pin(std::io::Cursor::new(data)) as BlobReader))
    }

    async fn exists(&self, path: &str) -> BackendResult<bool> {
        if self.take_fault(FaultPoint::Exists, path) {
            return Err(Self::injected(FaultPoint::Exists, path));
        }
        Ok(self.contains(path))
    }

    async fn copy(&self, from: &str, to: &str, policy: WritePolicy) -> BackendResult<CopyStatus> {
        if self.take_fault(FaultPoint::Copy, to) {
            return Err(Self::injected(FaultPoint::Copy, to));
        }
        let data = self
            .object(from)
            .ok_or_else(|| BackendError::NotFound(from.to_owned()))?;

        if self.deferred_polls == 0 {
            return Ok(self.finish_copy(data, to, policy));
        }

        if self.partial_copies {
            let mut objects = self.objects.write().expect("lock poisoned");
            if policy == WritePolicy::IfAbsent && objects.contains_key(to) {
                return Ok(CopyStatus::DestinationExists);
            }
            objects.insert(to.to_owned(), data.slice(..data.len() / 2));
        }

        let id = CopyId(format!(
            "copy-{}",
            self.next_copy.fetch_add(1, Ordering::SeqCst)
        ));
        self.copies.lock().expect("lock poisoned").insert(
            id.clone(),
            PendingCopy {
                data,
                to: to.to_owned(),
                policy,
                remaining_polls: self.deferred_polls,
            },
        );
        Ok(CopyStatus::Pending(id))
    }

    async fn poll_copy(&self, id: &CopyId) -> BackendResult<CopyStatus> {
        let finished = {
            let mut copies = self.copies.lock().expect("lock poisoned");
            let pending = copies
                .get_mut(id)
                .ok_or_else(|| BackendError::UnknownCopy(id.clone()))?;
            pending.remaining_polls = pending.remaining_polls.saturating_sub(1);
            if pending.remaining_polls > 0 {
                return Ok(CopyStatus::Pending(id.clone()));
            }
            copies.remove(id)
        };
        match finished {
            Some(copy) => {
                let policy = copy.landing_policy(self.partial_copies);
                Ok(self.finish_copy(copy.data, &copy.to, policy))
            }
            None => Err(BackendError::UnknownCopy(id.clone())),
        }
    }

    async fn abort_copy(&self, id: &CopyId) -> BackendResult<()> {
        self.copies.lock().expect("lock poisoned").remove(id);
        Ok(())
    }

    async fn delete(&self, path: &str) -> BackendResult<bool> {
        if self.take_fault(FaultPoint::Delete, path) {
            return Err(Self::injected(FaultPoint::Delete, path));
        }
        Ok(self
            .objects
            .write()
            .expect("lock poisoned")
            .remove(path)
            .is_some())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("object_count", &self.len())
            .field("deferred_polls", &self.deferred_polls)
            .field("partial_copies", &self.partial_copies)
            .finish()
    }
}
