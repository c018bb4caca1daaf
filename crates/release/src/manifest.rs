//! Build manifest uploaded next to every artifact bundle.

use crate::error::Result;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};

/// Provenance record RiffRaff reads to list a build.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Branch the build ran on.
    pub branch: String,
    /// Repository URL.
    #[serde(rename = "vcsURL")]
    pub vcs_url: String,
    /// Commit SHA.
    pub revision: String,
    /// ISO-8601 start time of the build.
    #[serde(rename = "startTime")]
    pub start_time: String,
    /// Build number.
    #[serde(rename = "buildNumber")]
    pub build_number: String,
    /// Package name.
    #[serde(rename = "projectName")]
    pub project_name: String,
}

impl BuildManifest {
    /// Derives the manifest from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            branch: settings.branch_name.clone(),
            vcs_url: settings.vcs_url.clone(),
            revision: settings.vcs_revision.clone(),
            start_time: settings.build_start_time_iso(),
            build_number: settings.build_id.clone(),
            project_name: settings.package_name.clone(),
        }
    }

    /// Compact JSON, as uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON for terminal output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
