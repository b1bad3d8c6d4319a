//! Artifact storage for the vscribe pipeline.
//!
//! This crate provides:
//! - A filesystem artifact store addressed by `(kind, stem)`
//! - Atomic writes, secondary renditions and JSON helpers
//! - A SQLite catalog of uploaded videos and rendered word clouds

pub mod catalog;
pub mod error;
pub mod operations;
pub mod store;

pub use catalog::Catalog;
pub use error::{StorageError, StorageResult};
pub use operations::StoredUpload;
pub use store::{ArtifactStore, StoreConfig};
