//! S3 implementation of [`ObjectStore`].

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use riffraff_release::backends::{ObjectAcl, ObjectBody, ObjectStore, PutObject};
use riffraff_release::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Configuration for the S3 store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    /// Region override; the provider chain decides when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
}

impl S3Config {
    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint. Path-style addressing is used with it.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Whether requests use `endpoint/bucket/key` addressing.
    #[must_use]
    pub const fn force_path_style(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Applies the overrides to an SDK config builder.
    fn apply(&self, mut builder: aws_sdk_s3::config::Builder) -> aws_sdk_s3::config::Builder {
        if let Some(region) = &self.region {
            builder = builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder.force_path_style(self.force_path_style())
    }
}

/// Object store backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Creates a store from the standard AWS provider chain.
    ///
    /// Credentials are resolved lazily, so a missing profile only surfaces
    /// on the first upload.
    pub async fn from_env(config: S3Config) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let builder = config.apply(aws_sdk_s3::config::Builder::from(&shared));
        debug!(
            region = ?config.region,
            endpoint = ?config.endpoint,
            "Created S3 client"
        );
        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

const fn canned_acl(acl: ObjectAcl) -> ObjectCannedAcl {
    match acl {
        ObjectAcl::BucketOwnerFullControl => ObjectCannedAcl::BucketOwnerFullControl,
    }
}

impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
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

            let body = match body {
                ObjectBody::Bytes(bytes) => ByteStream::from(bytes),
                ObjectBody::File(path) => ByteStream::from_path(&path).await.map_err(|e| {
                    Error::publish(
                        format!("Failed to read {}: {e}", path.display()),
                        location.bucket.clone(),
                        location.key.clone(),
                    )
                })?,
            };

            debug!(bucket = %location.bucket, key = %location.key, "Sending PutObject");
            self.client
                .put_object()
                .bucket(&location.bucket)
                .key(&location.key)
                .content_type(content_type)
                .acl(canned_acl(acl))
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    Error::publish(
                        DisplayErrorContext(&e).to_string(),
                        location.bucket.clone(),
                        location.key.clone(),
                    )
                })?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config(config: &S3Config) -> aws_sdk_s3::Config {
        config
            .apply(aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest()))
            .build()
    }

    #[test]
    fn test_default_config() {
        let config = S3Config::default();
        assert_eq!(config.region, None);
        assert!(!config.force_path_style());
    }

    #[test]
    fn test_endpoint_forces_path_style() {
        let config = S3Config::default()
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:9000");
        assert!(config.force_path_style());

        let sdk = offline_config(&config);
        assert_eq!(sdk.region().map(ToString::to_string), Some("eu-west-1".to_string()));
    }

    #[test]
    fn test_canned_acl() {
        assert_eq!(
            canned_acl(ObjectAcl::BucketOwnerFullControl).as_str(),
            ObjectAcl::BucketOwnerFullControl.as_str()
        );
    }
}
