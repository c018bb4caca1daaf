//! CI provider detection for riffraff-artefact.
//!
//! Classifies the current process as running under one of the recognized CI
//! providers (see [`provider::PROVIDERS`]) or as a local development build,
//! and resolves the branch, revision and build number the artifact is
//! published under.

pub mod context;
pub mod provider;

pub use context::{BuildEnvironment, DEV, DEV_BUILD_ID, Environment, UNKNOWN};
pub use provider::{CI_MARKER, CiProvider, PROVIDERS};
