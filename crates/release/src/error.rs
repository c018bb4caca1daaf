//! Error types for packaging and publishing.

use crate::pipeline::Step;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving settings, packaging, or publishing.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The project descriptor is missing, unreadable, or incomplete.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(riffraff::release::configuration),
        help("The project root must contain a package.json with at least a \"name\" field")
    )]
    Configuration {
        /// The error message
        message: String,
        /// The descriptor path
        path: Option<PathBuf>,
    },

    /// Failed to clean the staging directory.
    #[error("Failed to clean staging directory: {message}")]
    #[diagnostic(
        code(riffraff::release::cleanup),
        help("Check that target/riffraff is writable and not held open by another process")
    )]
    Cleanup {
        /// The error message
        message: String,
        /// The path that could not be removed
        path: PathBuf,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to create a staging directory.
    #[error("Failed to create directory: {message}")]
    #[diagnostic(
        code(riffraff::release::directory),
        help("Check that the project root is writable")
    )]
    Directory {
        /// The error message
        message: String,
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to copy a file into the staging directory.
    #[error("Failed to stage file: {message}")]
    #[diagnostic(
        code(riffraff::release::staging),
        help("Ensure deploy.json and the cloudformation template exist in the project root")
    )]
    Staging {
        /// The step that was staging the file
        step: Step,
        /// The error message
        message: String,
        /// The file that could not be staged
        path: PathBuf,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to create the package tarball.
    #[error("Failed to compress package: {message}")]
    #[diagnostic(
        code(riffraff::release::compression),
        help("Check that the configured buildDir exists and is readable")
    )]
    Compression {
        /// The error message
        message: String,
        /// The path that caused the error
        path: Option<PathBuf>,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to create the artifact bundle.
    #[error("Failed to create artifact bundle: {message}")]
    #[diagnostic(code(riffraff::release::bundling))]
    Bundling {
        /// The error message
        message: String,
        /// The path that caused the error
        path: Option<PathBuf>,
    },

    /// An upload failed.
    #[error("Publish failed: {message}")]
    #[diagnostic(
        code(riffraff::release::publish),
        help("Check AWS credentials and that the role may write to {bucket}")
    )]
    Publish {
        /// The error message
        message: String,
        /// The destination bucket
        bucket: String,
        /// The destination key
        key: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(riffraff::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(riffraff::release::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Configuration {
            message: message.into(),
            path,
        }
    }

    /// Create a new cleanup error with source.
    #[must_use]
    pub fn cleanup(message: impl Into<String>, path: PathBuf, source: std::io::Error) -> Self {
        Self::Cleanup {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    /// Create a new directory error.
    #[must_use]
    pub fn directory(
        message: impl Into<String>,
        path: PathBuf,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Directory {
            message: message.into(),
            path,
            source,
        }
    }

    /// Create a new staging error.
    #[must_use]
    pub fn staging(
        step: Step,
        message: impl Into<String>,
        path: PathBuf,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Staging {
            step,
            message: message.into(),
            path,
            source,
        }
    }

    /// Create a new compression error.
    #[must_use]
    pub fn compression(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Compression {
            message: message.into(),
            path,
            source,
        }
    }

    /// Create a new bundling error.
    #[must_use]
    pub fn bundling(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Bundling {
            message: message.into(),
            path,
        }
    }

    /// Create a new publish error.
    #[must_use]
    pub fn publish(
        message: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::Publish {
            message: message.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create the error a step reports when it exceeds its time limit.
    #[must_use]
    pub fn step_timed_out(step: Step, limit: std::time::Duration) -> Self {
        let message = format!("{step} did not finish within {}s", limit.as_secs());
        let timeout = || std::io::Error::new(std::io::ErrorKind::TimedOut, message.clone());
        match step {
            Step::Clean => Self::Cleanup {
                message: message.clone(),
                path: PathBuf::new(),
                source: Some(timeout()),
            },
            Step::PrepareDirectories => Self::directory(message.clone(), PathBuf::new(), Some(timeout())),
            Step::StageCloudformation | Step::StageDeployDescriptor | Step::RelocateArchive => {
                Self::staging(step, message.clone(), PathBuf::new(), Some(timeout()))
            }
            Step::Compress => Self::compression(message.clone(), None, Some(timeout())),
            Step::Bundle => Self::bundling(message, None),
        }
    }

    /// The pipeline step this error was raised by, if any.
    #[must_use]
    pub const fn failed_step(&self) -> Option<Step> {
        match self {
            Self::Cleanup { .. } => Some(Step::Clean),
            Self::Directory { .. } => Some(Step::PrepareDirectories),
            Self::Staging { step, .. } => Some(*step),
            Self::Compression { .. } => Some(Step::Compress),
            Self::Bundling { .. } => Some(Step::Bundle),
            Self::Configuration { .. } | Self::Publish { .. } | Self::Io(_) | Self::Json(_) => {
                None
            }
        }
    }

    /// Returns true for configuration errors raised before the pipeline starts.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns true for upload failures.
    #[must_use]
    pub const fn is_publish(&self) -> bool {
        matches!(self, Self::Publish { .. })
    }
}
