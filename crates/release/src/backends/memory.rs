use super::{ObjectAcl, ObjectBody, ObjectLocation, ObjectStore, PutObject};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object content.
    pub bytes: Vec<u8>,
    /// MIME type it was uploaded with.
    pub content_type: &'static str,
    /// ACL it was uploaded with.
    pub acl: ObjectAcl,
}

/// In-memory [`ObjectStore`].
///
/// Uploads to buckets registered with [`MemoryStore::fail_bucket`] are
/// rejected, which lets tests exercise partial publish failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectLocation, StoredObject>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every later upload to `bucket`.
    pub fn fail_bucket(&self, bucket: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.into());
    }

    /// Returns the object at `bucket`/`key`, if uploaded.
    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ObjectLocation::new(bucket, key))
            .cloned()
    }

    /// All uploaded locations, sorted.
    #[must_use]
    pub fn locations(&self) -> Vec<ObjectLocation> {
        let mut locations: Vec<_> = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        locations.sort_by(|a, b| (&a.bucket, &a.key).cmp(&(&b.bucket, &b.key)));
        locations
    }

    fn is_failing(&self, bucket: &str) -> bool {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(bucket)
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn put_object<'a>(
        &'a self,
        request: PutObject,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let PutObject {
                location,
                body,
                content_type,
                acl,
            } = request;

            if self.is_failing(&location.bucket) {
                return Err(Error::publish(
                    "Access Denied",
                    location.bucket,
                    location.key,
                ));
            }

            let bytes = match body {
                ObjectBody::Bytes(bytes) => bytes,
                ObjectBody::File(path) => tokio::fs::read(&path).await.map_err(|e| {
                    Error::publish(
                        format!("Failed to read {}: {e}", path.display()),
                        location.bucket.clone(),
                        location.key.clone(),
                    )
                })?,
            };

            debug!(location = %location, size = bytes.len(), "Stored object in memory");
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    location,
                    StoredObject {
                        bytes,
                        content_type,
                        acl,
                    },
                );
            Ok(())
        })
    }
}
