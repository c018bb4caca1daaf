//! Project descriptor (`package.json`) parsing.
//!
//! Only the handful of fields the packager cares about are read; everything
//! else in the file is ignored.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// File name of the project descriptor, relative to the project root.
pub const DESCRIPTOR_FILE: &str = "package.json";

/// The `repository` field, which npm allows as a bare URL or an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Repository {
    /// `"repository": "git@github.com:org/project.git"`
    Url(String),
    /// `"repository": { "type": "git", "url": "..." }`
    Object {
        /// Repository URL.
        #[serde(default)]
        url: Option<String>,
    },
}

impl Repository {
    /// The repository URL, if one is given and non-empty.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url.as_str()),
            Self::Object { url } => url.as_deref(),
        }
        .filter(|url| !url.is_empty())
    }
}

/// The subset of `package.json` the packager reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectDescriptor {
    /// Package name; names the per-package directory and remote key prefix.
    #[serde(default)]
    pub name: Option<String>,
    /// VCS repository.
    #[serde(default)]
    pub repository: Option<Repository>,
    /// Cloudformation template path, relative to the project root.
    #[serde(default)]
    pub cloudformation: Option<String>,
    /// Directory to package instead of the whole working directory.
    #[serde(default, rename = "buildDir")]
    pub build_dir: Option<String>,
}

impl ProjectDescriptor {
    /// Parses a descriptor from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid JSON, or the
    /// `name` field is missing, empty, or not usable as a single path segment.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(content).map_err(|e| {
            Error::configuration(
                format!("Invalid {}: {e}", path.display()),
                Some(path.to_path_buf()),
            )
        })?;

        if descriptor.package_name().is_none() {
            return Err(Error::configuration(
                format!("{} has no \"name\" field", path.display()),
                Some(path.to_path_buf()),
            ));
        }
        if let Some(name) = descriptor.package_name()
            && !is_single_segment(name)
        {
            return Err(Error::configuration(
                format!(
                    "{} has name {name:?}, which contains a path separator or \"..\"",
                    path.display()
                ),
                Some(path.to_path_buf()),
            ));
        }

        Ok(descriptor)
    }

    /// Reads the descriptor from a project root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(DESCRIPTOR_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::configuration(
                format!("Failed to read {}: {e}", path.display()),
                Some(path.clone()),
            )
        })?;
        Self::parse(&content, &path)
    }

    /// The package name, if present and non-empty.
    #[must_use]
    pub fn package_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.trim().is_empty())
    }

    /// The repository URL, if present and non-empty.
    #[must_use]
    pub fn vcs_url(&self) -> Option<&str> {
        self.repository.as_ref().and_then(Repository::url)
    }

    /// The build directory, if present and non-empty.
    #[must_use]
    pub fn build_dir(&self) -> Option<&str> {
        self.build_dir.as_deref().filter(|dir| !dir.is_empty())
    }
}

/// The name is used as a directory name and as a file stem.
pub(crate) fn is_single_segment(name: &str) -> bool {
    name != "." && !name.contains(['/', '\\']) && !name.contains("..")
}
