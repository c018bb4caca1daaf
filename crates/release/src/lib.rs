//! Artifact packaging and publishing for RiffRaff deployments.
//!
//! This crate turns a project checkout into the deployable artifact RiffRaff
//! expects and publishes it next to a build manifest.
//!
//! # Architecture
//!
//! - [`settings`] - Resolve the build settings from `package.json` and the CI environment
//! - [`pipeline`] - Run the packaging steps into `target/riffraff`
//! - [`artifact`] - Tarball and zip creation
//! - [`manifest`] - The `build.json` provenance record
//! - [`publish`] - Upload the bundle and manifest
//! - [`backends`] - The [`ObjectStore`] trait uploads go through
//!
//! # Example
//!
//! ```rust,ignore
//! use riffraff_release::{MemoryStore, Pipeline, Publisher, Settings};
//! use riffraff_ci::BuildEnvironment;
//! use std::path::Path;
//!
//! let settings = Settings::load(Path::new("."), &std::env::current_dir()?, BuildEnvironment::detect())?;
//! Pipeline::new(&settings).run().await?;
//!
//! let store = MemoryStore::new();
//! Publisher::new(&store).publish(&settings).await?;
//! ```

pub mod artifact;
pub mod backends;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod publish;
pub mod settings;

pub use backends::{MemoryStore, ObjectAcl, ObjectBody, ObjectLocation, ObjectStore, PutObject};
pub use descriptor::{ProjectDescriptor, Repository};
pub use error::{Error, Result};
pub use manifest::BuildManifest;
pub use pipeline::{Pipeline, PipelineReport, Step};
pub use publish::{PublishReport, Publisher};
pub use settings::Settings;
