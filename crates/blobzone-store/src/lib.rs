//! Content-addressed blob storage on top of object storage.
//!
//! Object stores generally offer upload, download, copy, delete and an
//! existence check, but no atomic rename. This crate builds a small blob
//! lifecycle on those primitives:
//!
//! - **staging** (`tmp/<key>`) — uploads whose identifier is not yet accepted
//! - **store** (`blocks/<id>`) — committed blobs, written once per identifier
//! - **quarantine** (`quarantine/<id>`) — blobs withdrawn for review
//!
//! Moves between zones are copy, wait, then delete. A failure part-way
//! leaves a duplicate, never a loss.
//!
//! # Backends
//!
//! All backends implement the [`ObjectBackend`] trait:
//!
//! - [`InMemoryBackend`] — `HashMap`-based backend for tests and embedding,
//!   with deferred copies and fault injection
//! - [`LocalFsBackend`] — a directory acting as a container
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use blobzone_store::{BlobStore, InMemoryBackend, StoreConfig};
//! use blobzone_types::ContentId;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BlobStore::new(Arc::new(InMemoryBackend::new()), StoreConfig::default());
//!
//! let key = store.put_temp(b"cat".to_vec()).await?;
//! let id = ContentId::blake3(b"cat");
//! store.make_permanent(&key, &id).await?;
//!
//! assert_eq!(store.get_bytes(&id).await?.as_ref(), b"cat");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod content;
pub mod copy;
pub mod error;
pub mod local;
pub mod memory;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::{BackendError, BackendResult, CopyId, CopyStatus, ObjectBackend, WritePolicy};
pub use config::StoreConfig;
pub use content::{BlobContent, BlobReader};
pub use copy::{await_copy, CopyOutcome, CopyWait};
pub use error::{StoreError, StoreResult};
pub use local::LocalFsBackend;
pub use memory::{FaultPoint, InMemoryBackend};
pub use store::BlobStore;
