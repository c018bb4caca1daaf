//! Amazon S3 object store for riffraff-artefact.
//!
//! This crate provides [`S3Store`], the [`ObjectStore`](riffraff_release::ObjectStore)
//! that publishes artifact bundles and build manifests to S3 or any
//! S3-compatible endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use riffraff_s3::{S3Config, S3Store};
//! use riffraff_release::Publisher;
//!
//! let store = S3Store::from_env(S3Config::default().with_region("eu-west-1")).await;
//! Publisher::new(&store).publish(&settings).await?;
//! ```

mod store;

pub use store::{S3Config, S3Store};
