use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::copy::CopyWait;

/// Tuning for a [`BlobStore`](crate::BlobStore).
///
/// Connection identity and credentials belong to the backend adapter and are
/// supplied when it is constructed; nothing here is read after start-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Delay between polls of a pending server-side copy.
    pub copy_poll_interval: Duration,
    /// Upper bound on waiting for one copy to finish.
    pub copy_timeout: Duration,
    /// Re-hash staged bytes before committing them under an identifier.
    pub verify_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            copy_poll_interval: Duration::from_millis(200),
            copy_timeout: Duration::from_secs(60),
            verify_on_commit: false,
        }
    }
}

impl StoreConfig {
    /// Copy-completion bounds derived from this configuration.
    pub fn copy_wait(&self) -> CopyWait {
        CopyWait {
            poll_interval: self.copy_poll_interval,
            timeout: self.copy_timeout,
        }
    }
}
