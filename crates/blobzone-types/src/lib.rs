//! Value types for the blobzone content-addressed blob store.
//!
//! Nothing in this crate performs I/O. It defines the names under which blobs
//! live in an object-storage container and the rules those names obey.
//!
//! # Key Types
//!
//! - [`ContentId`] — Self-describing digest of blob content, used as its own storage key
//! - [`ContentHasher`] — Incremental computation of a [`ContentId`] over streamed content
//! - [`StagingKey`] — Opaque, unguessable handle for not-yet-committed content
//! - [`KeyGenerator`] — Source of staging keys (random in production, sequential in tests)
//! - [`Zone`] / [`ZonePath`] — The staging, store, and quarantine namespaces

pub mod content_id;
pub mod error;
pub mod staging;
pub mod zone;

pub use content_id::{ContentHasher, ContentId, HashAlgorithm};
pub use error::TypeError;
pub use staging::{KeyGenerator, RandomKeyGenerator, SequentialKeyGenerator, StagingKey};
pub use zone::{Zone, ZonePath};
