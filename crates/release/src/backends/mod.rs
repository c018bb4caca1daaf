//! Object storage backends.
//!
//! This module defines the [`ObjectStore`] trait that storage provider crates
//! implement to receive uploads.
//!
//! # Architecture
//!
//! The release crate provides:
//! - [`ObjectStore`] trait - interface for writing a single object
//! - [`PutObject`] - one upload request (bucket, key, body, ACL)
//! - [`MemoryStore`] - in-process store for tests
//!
//! Provider crates implement `ObjectStore`:
//! - `riffraff-s3` - Amazon S3 and S3-compatible stores
//!
//! # Example
//!
//! ```rust,ignore
//! use riffraff_release::backends::{ObjectStore, PutObject};
//!
//! struct MyStore;
//!
//! impl ObjectStore for MyStore {
//!     fn name(&self) -> &'static str { "my-store" }
//!
//!     fn put_object<'a>(
//!         &'a self,
//!         request: PutObject,
//!     ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
//!         Box::pin(async move {
//!             // Write the object...
//!             Ok(())
//!         })
//!     }
//! }
//! ```

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Canned access-control policy applied to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectAcl {
    /// Both the object writer and the bucket owner get full control.
    #[default]
    BucketOwnerFullControl,
}

impl ObjectAcl {
    /// The canned ACL header value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for ObjectAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    /// Streamed from a local file.
    File(PathBuf),
    /// Held in memory.
    Bytes(Vec<u8>),
}

/// Where an object lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl ObjectLocation {
    /// Creates a new location.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// A single upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    /// Destination.
    pub location: ObjectLocation,
    /// Object content.
    pub body: ObjectBody,
    /// MIME type.
    pub content_type: &'static str,
    /// Access-control policy.
    pub acl: ObjectAcl,
}

impl PutObject {
    /// Uploads a local file.
    #[must_use]
    pub fn file(location: ObjectLocation, path: impl Into<PathBuf>, content_type: &'static str) -> Self {
        Self {
            location,
            body: ObjectBody::File(path.into()),
            content_type,
            acl: ObjectAcl::default(),
        }
    }

    /// Uploads an in-memory buffer.
    #[must_use]
    pub fn bytes(location: ObjectLocation, bytes: impl Into<Vec<u8>>, content_type: &'static str) -> Self {
        Self {
            location,
            body: ObjectBody::Bytes(bytes.into()),
            content_type,
            acl: ObjectAcl::default(),
        }
    }
}

/// Trait for object storage backends.
///
/// Implementations write exactly one object per call and do not retry.
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this backend (e.g., "s3", "memory").
    fn name(&self) -> &'static str;

    /// Writes an object, replacing any existing object at the same key.
    fn put_object<'a>(
        &'a self,
        request: PutObject,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
