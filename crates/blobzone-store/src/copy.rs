use std::time::Duration;

use blobzone_types::ZonePath;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{CopyId, CopyStatus, ObjectBackend};
use crate::error::{StoreError, StoreResult};

/// How long to wait for a server-side copy, and how often to ask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Terminal, successful state of a copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The destination now holds the source's bytes.
    Copied,
    /// An `IfAbsent` copy found the destination already there.
    DestinationExists,
}

/// Drive a copy to a terminal state.
///
/// `initial` is whatever [`ObjectBackend::copy`] returned. Pending copies are
/// polled until they complete, fail, or `wait.timeout` elapses. Only
/// `Ok(_)` means the destination can be trusted. On any error the copy is
/// aborted and the destination deleted, so a short object is never left
/// under `to`.
pub async fn await_copy(
    backend: &dyn ObjectBackend,
    initial: CopyStatus,
    from: &ZonePath,
    to: &ZonePath,
    wait: CopyWait,
) -> StoreResult<CopyOutcome> {
    let deadline = Instant::now() + wait.timeout;
    let mut status = initial;
    let (pending, err) = loop {
        match status {
            CopyStatus::Complete => return Ok(CopyOutcome::Copied),
            CopyStatus::DestinationExists => return Ok(CopyOutcome::DestinationExists),
            CopyStatus::Failed(reason) => {
                let err = StoreError::CopyFailed {
                    from: from.clone(),
                    to: to.clone(),
                    reason,
                };
                break (None, err);
            }
            CopyStatus::Pending(id) => {
                let step = async {
                    tokio::time::sleep(wait.poll_interval).await;
                    backend.poll_copy(&id).await
                };
                let polled = tokio::time::timeout_at(deadline, step).await;
                match polled {
                    Ok(Ok(next)) => status = next,
                    Ok(Err(e)) => break (Some(id), StoreError::backend("poll_copy", to, e)),
                    Err(_) => {
                        warn!(
                            %from,
                            %to,
                            timeout = ?wait.timeout,
                            "copy did not complete in time"
                        );
                        let err = StoreError::CopyTimeout {
                            from: from.clone(),
                            to: to.clone(),
                            timeout: wait.timeout,
                        };
                        break (Some(id), err);
                    }
                }
            }
        }
    };

    discard_destination(backend, pending.as_ref(), to).await;
    Err(err)
}

/// Abort an unfinished copy and remove whatever it wrote.
async fn discard_destination(
    backend: &dyn ObjectBackend,
    pending: Option<&CopyId>,
    to: &ZonePath,
) {
    if let Some(id) = pending {
        if let Err(e) = backend.abort_copy(id).await {
            warn!(%to, copy = %id, error = %e, "could not abort copy");
        }
    }
    match backend.delete(to.as_str()).await {
        Ok(removed) => debug!(%to, removed, "discarded unfinished copy destination"),
        Err(e) => warn!(%to, error = %e, "unfinished copy destination could not be removed"),
    }
}
