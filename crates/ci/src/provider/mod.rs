//! Recognized CI providers.
//!
//! Every provider is a row in [`PROVIDERS`]: the marker variables that identify
//! it and the variables it exposes branch, revision and build number through.
//! Detection walks the table in order and the first row whose markers are all
//! present wins, so supporting a new CI system means adding a row here.

use serde::Serialize;
use std::fmt;

/// Generic marker set by every supported CI system.
pub const CI_MARKER: &str = "CI";

/// Variable naming conventions of a single CI provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CiProvider {
    /// Stable provider name (e.g. "circle-ci").
    pub name: &'static str,
    /// Variables that must all be set for the provider to be detected.
    pub markers: &'static [&'static str],
    /// Variable holding the branch being built.
    pub branch_var: &'static str,
    /// Variable holding the commit SHA.
    pub revision_var: &'static str,
    /// Variable holding the build number.
    pub build_id_var: &'static str,
}

/// CircleCI.
pub const CIRCLE_CI: CiProvider = CiProvider {
    name: "circle-ci",
    markers: &["CIRCLECI", CI_MARKER],
    branch_var: "CIRCLE_BRANCH",
    revision_var: "CIRCLE_SHA1",
    build_id_var: "CIRCLE_BUILD_NUM",
};

/// Travis CI.
pub const TRAVIS_CI: CiProvider = CiProvider {
    name: "travis-ci",
    markers: &["TRAVIS", CI_MARKER],
    branch_var: "TRAVIS_BRANCH",
    revision_var: "TRAVIS_COMMIT",
    build_id_var: "TRAVIS_BUILD_NUMBER",
};

/// Providers in detection order.
pub static PROVIDERS: &[CiProvider] = &[CIRCLE_CI, TRAVIS_CI];

impl CiProvider {
    /// Returns true when every marker variable is set to a non-empty value.
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        self.markers
            .iter()
            .all(|var| lookup(var).is_some_and(|value| !value.is_empty()))
    }

    /// Finds the first provider whose markers are present.
    pub fn detect<F>(lookup: &F) -> Option<&'static Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        PROVIDERS.iter().find(|provider| provider.matches(lookup))
    }

    /// Looks a provider up by its stable name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static Self> {
        PROVIDERS.iter().find(|provider| provider.name == name)
    }
}

impl fmt::Display for CiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
