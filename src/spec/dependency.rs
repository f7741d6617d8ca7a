// src/spec/dependency.rs

//! Declared relationships between packages

use regex::Regex;
use std::sync::LazyLock;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

static DEPENDENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9+.-]*)(?:(<=|>=|==|<<|>>|<|>|=)([^<>=].*))?$")
        .expect("Invalid dependency regex")
});

/// Dependency keys of a `defines` file, stored verbatim in the catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumString, EnumIter,
)]
pub enum Relationship {
    /// Runtime dependency
    #[strum(serialize = "PKGDEP")]
    Depends,
    #[strum(serialize = "PKGRECOM")]
    Recommends,
    #[strum(serialize = "PKGCONFL")]
    Conflicts,
    #[strum(serialize = "PKGBREAK")]
    Breaks,
    #[strum(serialize = "PKGREP")]
    Replaces,
    #[strum(serialize = "PKGPROV")]
    Provides,
    #[strum(serialize = "PKGSUG")]
    Suggests,
    /// Build-time dependency
    #[strum(serialize = "BUILDDEP")]
    BuildDepends,
    /// Equivalent for foreign dpkg packaging
    #[strum(serialize = "PKGDEP_DPKG")]
    DependsDpkg,
    /// Equivalent for foreign rpm packaging
    #[strum(serialize = "PKGDEP_RPM")]
    DependsRpm,
}

impl Relationship {
    /// Whether the declaring package needs the target to be installable
    pub fn is_requirement(self) -> bool {
        matches!(
            self,
            Relationship::Depends
                | Relationship::BuildDepends
                | Relationship::DependsDpkg
                | Relationship::DependsRpm
        )
    }
}

/// One row of `package_dependencies`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub package: String,
    pub dependency: String,
    pub relop: Option<String>,
    pub version: Option<String>,
    /// Empty for architecture-independent declarations
    pub architecture: String,
    pub relationship: Relationship,
}

/// Parse a whitespace-separated dependency list.
///
/// Tokens that are not `name[relop version]` are logged and skipped.
pub fn parse_dependencies(
    package: &str,
    value: &str,
    architecture: &str,
    relationship: Relationship,
) -> Vec<Dependency> {
    value
        .split_whitespace()
        .filter_map(|token| {
            let Some(caps) = DEPENDENCY_RE.captures(token) else {
                warn!(
                    "{}: malformed {} entry '{}' dropped",
                    package, relationship, token
                );
                return None;
            };
            Some(Dependency {
                package: package.to_string(),
                dependency: caps[1].to_string(),
                relop: caps.get(2).map(|m| m.as_str().to_string()),
                version: caps.get(3).map(|m| m.as_str().to_string()),
                architecture: architecture.to_string(),
                relationship,
            })
        })
        .collect()
}

/// Order-preserving removal of repeated tuples
pub fn dedup(dependencies: Vec<Dependency>) -> Vec<Dependency> {
    let mut seen = std::collections::HashSet::new();
    dependencies
        .into_iter()
        .filter(|dep| seen.insert(dep.clone()))
        .collect()
}
