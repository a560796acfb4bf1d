//! Blob storage for uploaded artifacts.
//!
//! [`BlobStore`] is implemented by the local filesystem, S3 and in-memory
//! backends. [`ArtifactManager`] sits on top and owns the artifact naming
//! scheme, best-effort deletion and download links.

pub mod artifacts;
pub mod blob;
pub mod config;
pub mod error;
pub mod links;
pub mod local;
pub mod memory;
pub mod s3;

pub use artifacts::ArtifactManager;
pub use blob::BlobStore;
pub use config::{StorageBackendType, StorageConfig};
pub use error::StorageError;
pub use links::LinkSigner;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
