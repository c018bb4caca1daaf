//! Publishing of the artifact bundle and build manifest.
//!
//! Both uploads start together and the publish succeeds only if both do. There
//! is no rollback: when one upload fails the other may already be stored, and
//! re-publishing the same build id overwrites both objects.

use crate::backends::{ObjectLocation, ObjectStore, PutObject};
use crate::error::{Error, Result};
use crate::manifest::BuildManifest;
use crate::settings::Settings;
use std::time::Duration;
use tracing::{error, info};

/// MIME type of the artifact bundle.
pub const BUNDLE_CONTENT_TYPE: &str = "application/zip";

/// MIME type of the build manifest.
pub const MANIFEST_CONTENT_TYPE: &str = "application/json";

/// Where the published objects were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// The artifact bundle.
    pub bundle: ObjectLocation,
    /// The build manifest.
    pub manifest: ObjectLocation,
}

/// Uploads packaged builds to an [`ObjectStore`].
pub struct Publisher<'a> {
    store: &'a dyn ObjectStore,
    upload_timeout: Option<Duration>,
}

impl<'a> Publisher<'a> {
    /// Creates a publisher writing to `store`.
    #[must_use]
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            upload_timeout: None,
        }
    }

    /// Fails any single upload that runs longer than `limit`.
    #[must_use]
    pub const fn with_upload_timeout(mut self, limit: Option<Duration>) -> Self {
        self.upload_timeout = limit;
        self
    }

    /// Uploads the bundle and the manifest for `settings`.
    ///
    /// # Errors
    ///
    /// Returns a publish error if the bundle has not been built or either
    /// upload fails.
    pub async fn publish(&self, settings: &Settings) -> Result<PublishReport> {
        let bundle_path = settings.bundle_path();
        let bundle = ObjectLocation::new(settings.artifact_bucket, settings.artifact_key());
        let manifest = ObjectLocation::new(settings.manifest_bucket, settings.manifest_key());

        let built = tokio::fs::metadata(&bundle_path)
            .await
            .is_ok_and(|m| m.is_file());
        if !built {
            return Err(Error::publish(
                format!(
                    "{} does not exist, package the build before publishing",
                    bundle_path.display()
                ),
                bundle.bucket,
                bundle.key,
            ));
        }

        let manifest_json = BuildManifest::from_settings(settings).to_json()?;

        info!(
            backend = self.store.name(),
            build = %settings.key_prefix(),
            "Publishing build"
        );

        let bundle_upload = self.upload(PutObject::file(
            bundle.clone(),
            bundle_path,
            BUNDLE_CONTENT_TYPE,
        ));
        let manifest_upload = self.upload(PutObject::bytes(
            manifest.clone(),
            manifest_json,
            MANIFEST_CONTENT_TYPE,
        ));
        tokio::try_join!(bundle_upload, manifest_upload)?;

        Ok(PublishReport { bundle, manifest })
    }

    async fn upload(&self, request: PutObject) -> Result<()> {
        let location = request.location.clone();
        info!(location = %location, "Uploading");

        let outcome = match self.upload_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.put_object(request))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::publish(
                        format!("upload did not finish within {}s", limit.as_secs_f64()),
                        location.bucket.clone(),
                        location.key.clone(),
                    ))
                }),
            None => self.store.put_object(request).await,
        };

        match outcome {
            Ok(()) => {
                info!(location = %location, "Uploaded");
                Ok(())
            }
            Err(e) => {
                error!(location = %location, error = %e, "Upload failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryStore;
    use crate::descriptor::ProjectDescriptor;
    use chrono::Utc;
    use riffraff_ci::BuildEnvironment;
    use std::path::Path;
    use tempfile::TempDir;

    fn settings(root: &Path) -> Settings {
        let descriptor =
            ProjectDescriptor::parse(r#"{"name":"demo"}"#, Path::new("package.json")).unwrap();
        Settings::from_descriptor(root, root, BuildEnvironment::dev(), &descriptor, Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_requires_bundle() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let err = Publisher::new(&store)
            .publish(&settings(temp.path()))
            .await
            .unwrap_err();
        assert!(err.is_publish());
        assert!(store.locations().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_directory_in_place_of_bundle() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path());
        std::fs::create_dir_all(settings.bundle_path()).unwrap();
        let store = MemoryStore::new();

        let err = Publisher::new(&store).publish(&settings).await.unwrap_err();
        assert!(err.is_publish());
        assert!(store.locations().is_empty());
    }

    #[tokio::test]
    async fn test_publish_writes_both_objects() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path());
        std::fs::create_dir_all(&settings.lead_dir).unwrap();
        std::fs::write(settings.bundle_path(), b"PK").unwrap();

        let store = MemoryStore::new();
        let report = Publisher::new(&store).publish(&settings).await.unwrap();

        assert_eq!(report.bundle.to_string(), "s3://riffraff-artifact/demo/dev/artifacts.zip");
        assert_eq!(report.manifest.to_string(), "s3://riffraff-builds/demo/dev/build.json");

        let bundle = store.get("riffraff-artifact", "demo/dev/artifacts.zip").unwrap();
        assert_eq!(bundle.content_type, BUNDLE_CONTENT_TYPE);
        let manifest = store.get("riffraff-builds", "demo/dev/build.json").unwrap();
        assert_eq!(manifest.content_type, MANIFEST_CONTENT_TYPE);
    }
}
