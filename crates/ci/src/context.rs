use crate::provider::CiProvider;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, info};

/// Branch and revision placeholder when a CI provider does not expose them.
pub const UNKNOWN: &str = "Unknown";
/// Build id placeholder when a CI provider does not expose a build number.
pub const DEV_BUILD_ID: &str = "DEV";
/// Value of every resolved field outside CI.
pub const DEV: &str = "dev";

/// Where the build is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// A recognized CI provider.
    Ci(&'static CiProvider),
    /// Local development, or an unrecognized CI system.
    Dev,
}

impl Environment {
    /// Returns true outside of any recognized CI provider.
    #[must_use]
    pub const fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    /// Returns the stable name ("circle-ci", "travis-ci", "dev").
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ci(provider) => provider.name,
            Self::Dev => DEV,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Build metadata resolved from the process environment.
///
/// Every field is always populated: values a provider does not expose fall
/// back to [`UNKNOWN`] or [`DEV_BUILD_ID`], never to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildEnvironment {
    /// The detected environment.
    pub environment: Environment,
    /// Branch being built.
    pub branch: String,
    /// Commit SHA being built.
    pub revision: String,
    /// Build number, used to partition uploaded objects.
    pub build_id: String,
}

impl BuildEnvironment {
    /// Resolves build metadata from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves build metadata through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(provider) = CiProvider::detect(&lookup) else {
            debug!("No CI provider markers found, assuming local development");
            return Self::dev();
        };

        let read = |var: &str, default: &str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let resolved = Self {
            environment: Environment::Ci(provider),
            branch: read(provider.branch_var, UNKNOWN),
            revision: read(provider.revision_var, UNKNOWN),
            build_id: read(provider.build_id_var, DEV_BUILD_ID),
        };

        info!(
            provider = provider.name,
            branch = %resolved.branch,
            revision = %resolved.revision,
            build_id = %resolved.build_id,
            "Detected CI provider"
        );

        resolved
    }

    /// Metadata for a local development build.
    #[must_use]
    pub fn dev() -> Self {
        Self {
            environment: Environment::Dev,
            branch: DEV.to_string(),
            revision: DEV.to_string(),
            build_id: DEV.to_string(),
        }
    }
}

impl fmt::Display for BuildEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} build {} on {} ({})",
            self.environment,
            self.build_id,
            self.branch,
            self.revision.get(..7).unwrap_or(&self.revision)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CIRCLE_CI, TRAVIS_CI};

    #[test]
    fn test_environment_names() {
        assert_eq!(Environment::Ci(&CIRCLE_CI).name(), "circle-ci");
        assert_eq!(Environment::Dev.to_string(), "dev");
        assert!(Environment::Dev.is_dev());
        assert!(!Environment::Ci(&TRAVIS_CI).is_dev());
    }

    #[test]
    fn test_environment_serializes_as_name() {
        let json = serde_json::to_string(&Environment::Ci(&TRAVIS_CI)).unwrap();
        assert_eq!(json, "\"travis-ci\"");
    }

    #[test]
    fn test_from_lookup_dev() {
        let env = BuildEnvironment::from_lookup(|_| None);
        assert_eq!(env, BuildEnvironment::dev());
        assert_eq!(env.build_id, "dev");
    }

    #[test]
    fn test_from_lookup_ignores_empty_metadata() {
        let env = BuildEnvironment::from_lookup(|name| match name {
            "CIRCLECI" | "CI" => Some("true".to_string()),
            "CIRCLE_BRANCH" => Some(String::new()),
            _ => None,
        });
        assert_eq!(env.environment, Environment::Ci(&CIRCLE_CI));
        assert_eq!(env.branch, UNKNOWN);
        assert_eq!(env.revision, UNKNOWN);
        assert_eq!(env.build_id, DEV_BUILD_ID);
    }

    #[test]
    fn test_display_shortens_revision() {
        let env = BuildEnvironment {
            environment: Environment::Ci(&CIRCLE_CI),
            branch: "main".to_string(),
            revision: "abcdef0123456789".to_string(),
            build_id: "12".to_string(),
        };
        assert_eq!(env.to_string(), "circle-ci build 12 on main (abcdef0)");
    }
}
