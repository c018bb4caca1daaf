//! Resolved packaging settings.
//!
//! [`Settings`] is built once at startup from the detected CI environment and
//! the project descriptor, and is only ever borrowed afterwards.

use crate::descriptor::ProjectDescriptor;
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use riffraff_ci::{BuildEnvironment, Environment, UNKNOWN};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the final bundle inside the staging directory.
pub const ARTIFACT_FILE: &str = "artifacts.zip";
/// Name of the uploaded build manifest.
pub const MANIFEST_FILE: &str = "build.json";
/// Deploy descriptor copied verbatim from the project root.
pub const DEPLOY_DESCRIPTOR_FILE: &str = "deploy.json";
/// Cloudformation template used when the descriptor names none.
pub const DEFAULT_CLOUDFORMATION: &str = "cloudformation.json";
/// Bucket receiving artifact bundles.
pub const ARTIFACT_BUCKET: &str = "riffraff-artifact";
/// Bucket receiving build manifests.
pub const MANIFEST_BUCKET: &str = "riffraff-builds";

/// Immutable snapshot of everything the pipeline and publisher need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Absolute project root.
    pub root_dir: PathBuf,
    /// Directory packaged when no build directory is configured.
    pub working_dir: PathBuf,
    /// Package name from the descriptor.
    pub package_name: String,
    /// Repository URL, or `Unknown`.
    #[serde(rename = "vcsURL")]
    pub vcs_url: String,
    /// Cloudformation template path relative to the root.
    pub cloudformation: String,
    /// Build directory relative to the working directory, if configured.
    pub build_dir: Option<String>,
    /// Detected environment.
    #[serde(rename = "env")]
    pub environment: Environment,
    /// Branch being built.
    #[serde(rename = "projectBranchName")]
    pub branch_name: String,
    /// Revision being built.
    pub vcs_revision: String,
    /// Build number partitioning the remote key space.
    pub build_id: String,
    /// When settings were resolved.
    #[serde(serialize_with = "serialize_timestamp")]
    pub build_start_time: DateTime<Utc>,
    /// `<root>/target`
    pub target_dir: PathBuf,
    /// `<root>/target/riffraff`, the staging directory.
    pub lead_dir: PathBuf,
    /// `<lead>/packages/<name>`
    pub package_dir: PathBuf,
    /// Bundle file name.
    #[serde(rename = "artefactsFilename")]
    pub artifact_file: &'static str,
    /// Manifest file name.
    pub manifest_file: &'static str,
    /// Bundle bucket.
    #[serde(rename = "artefactBucket")]
    pub artifact_bucket: &'static str,
    /// Manifest bucket.
    pub manifest_bucket: &'static str,
}

fn serialize_timestamp<S: Serializer>(
    time: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_timestamp(time))
}

/// Formats a timestamp as ISO-8601 UTC with millisecond precision.
#[must_use]
pub fn iso_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Settings {
    /// Resolves settings for a project root, reading its descriptor.
    ///
    /// A relative `root` is taken relative to `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the descriptor cannot be read or
    /// has no name.
    pub fn load(root: &Path, working_dir: &Path, env: BuildEnvironment) -> Result<Self> {
        let root_dir = working_dir.join(root);
        info!(environment = %env.environment, "Determined running in {}", env.environment);
        info!(root = %root_dir.display(), "Root project path set");
        debug!(
            descriptor = %root_dir.join(crate::descriptor::DESCRIPTOR_FILE).display(),
            "Reading configuration"
        );

        let descriptor = ProjectDescriptor::load(&root_dir)?;
        let settings = Self::from_descriptor(&root_dir, working_dir, env, &descriptor, Utc::now())?;

        debug!(settings = ?settings, "Resolved settings");
        Ok(settings)
    }

    /// Builds settings from an already-parsed descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the descriptor has no name, or a name
    /// containing a path separator or `..`.
    pub fn from_descriptor(
        root_dir: &Path,
        working_dir: &Path,
        env: BuildEnvironment,
        descriptor: &ProjectDescriptor,
        build_start_time: DateTime<Utc>,
    ) -> Result<Self> {
        let package_name = descriptor
            .package_name()
            .ok_or_else(|| {
                Error::configuration(
                    "project descriptor has no \"name\" field",
                    Some(root_dir.join(crate::descriptor::DESCRIPTOR_FILE)),
                )
            })?
            .to_string();
        if !crate::descriptor::is_single_segment(&package_name) {
            return Err(Error::configuration(
                format!("package name {package_name:?} cannot be used as a directory name"),
                Some(root_dir.join(crate::descriptor::DESCRIPTOR_FILE)),
            ));
        }

        let target_dir = root_dir.join("target");
        let lead_dir = target_dir.join("riffraff");
        let package_dir = lead_dir.join("packages").join(&package_name);

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            vcs_url: descriptor.vcs_url().unwrap_or(UNKNOWN).to_string(),
            cloudformation: descriptor
                .cloudformation
                .clone()
                .filter(|path| !path.is_empty())
                .unwrap_or_else(|| DEFAULT_CLOUDFORMATION.to_string()),
            build_dir: descriptor.build_dir().map(str::to_string),
            environment: env.environment,
            branch_name: env.branch,
            vcs_revision: env.revision,
            build_id: env.build_id,
            build_start_time,
            target_dir,
            lead_dir,
            package_dir,
            package_name,
            artifact_file: ARTIFACT_FILE,
            manifest_file: MANIFEST_FILE,
            artifact_bucket: ARTIFACT_BUCKET,
            manifest_bucket: MANIFEST_BUCKET,
        })
    }

    /// `<lead>/packages`
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.lead_dir.join("packages")
    }

    /// `<lead>/packages/cloudformation`
    #[must_use]
    pub fn cloudformation_dir(&self) -> PathBuf {
        self.packages_dir().join("cloudformation")
    }

    /// Final location of the package tarball.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.package_dir.join(self.archive_name())
    }

    /// `<name>.tgz`
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.tgz", self.package_name)
    }

    /// Final location of the artifact bundle.
    #[must_use]
    pub fn bundle_path(&self) -> PathBuf {
        self.lead_dir.join(self.artifact_file)
    }

    /// Remote key prefix, `<name>/<build id>`.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("{}/{}", self.package_name, self.build_id)
    }

    /// Remote key of the artifact bundle.
    #[must_use]
    pub fn artifact_key(&self) -> String {
        format!("{}/{}", self.key_prefix(), self.artifact_file)
    }

    /// Remote key of the build manifest.
    #[must_use]
    pub fn manifest_key(&self) -> String {
        format!("{}/{}", self.key_prefix(), self.manifest_file)
    }

    /// Build start time as ISO-8601.
    #[must_use]
    pub fn build_start_time_iso(&self) -> String {
        iso_timestamp(&self.build_start_time)
    }
}
