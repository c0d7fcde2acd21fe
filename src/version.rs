//! Catalog versioning utilities

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic version of a catalog snapshot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogVersion(Version);

impl CatalogVersion {
    pub const fn new(version: Version) -> Self {
        Self(version)
    }

    /// Parse a version string, with or without a leading `v`
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        Ok(Self(Version::parse(version_str)?))
    }

    pub fn version(&self) -> &Version {
        &self.0
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.0.to_string()
    }

    /// Get the tag string (e.g., "v1.2.3")
    pub fn tag_string(&self) -> String {
        format!("v{}", self.0)
    }

    /// Whether descriptors exported under `other` can be read by consumers of `self`.
    ///
    /// Same major version; for 0.x releases the minor version must match too.
    pub fn is_compatible_with(&self, other: &CatalogVersion) -> bool {
        if self.0.major != other.0.major {
            return false;
        }
        self.0.major > 0 || self.0.minor == other.0.minor
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = CatalogVersion::parse("v0.2.0").unwrap();
        assert_eq!(v.version_string(), "0.2.0");
        assert_eq!(v.tag_string(), "v0.2.0");
        assert_eq!(v.to_string(), "v0.2.0");
        assert!(CatalogVersion::parse("two").is_err());
    }

    #[test]
    fn test_compatibility() {
        let v020 = CatalogVersion::parse("0.2.0").unwrap();
        let v021 = CatalogVersion::parse("0.2.1").unwrap();
        let v030 = CatalogVersion::parse("0.3.0").unwrap();
        assert!(v020.is_compatible_with(&v021));
        assert!(!v020.is_compatible_with(&v030));

        let v1 = CatalogVersion::parse("1.0.0").unwrap();
        let v14 = CatalogVersion::parse("1.4.0").unwrap();
        let v2 = CatalogVersion::parse("2.0.0").unwrap();
        assert!(v1.is_compatible_with(&v14));
        assert!(!v1.is_compatible_with(&v2));
    }
}
