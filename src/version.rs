use crate::errors::*;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A Go module version, always with the leading `v`.
///
/// Comparison follows Go's module semver rules: `v1.2` equals `v1.2.0` and
/// build metadata is ignored.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    raw: String,
    parsed: semver::Version,
}

impl SemanticVersion {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_prerelease(&self) -> bool {
        !self.parsed.pre.is_empty()
    }

    fn precedence(&self) -> (u64, u64, u64, &semver::Prerelease) {
        (
            self.parsed.major,
            self.parsed.minor,
            self.parsed.patch,
            &self.parsed.pre,
        )
    }
}

fn parse_go_semver(s: &str) -> Option<semver::Version> {
    let rest = s.strip_prefix('v')?;
    if let Ok(version) = semver::Version::parse(rest) {
        return Some(version);
    }

    // shorthand forms are only valid without prerelease or build suffix
    if rest.contains(['-', '+']) {
        return None;
    }
    let padded = match rest.split('.').count() {
        1 => format!("{}.0.0", rest),
        2 => format!("{}.0", rest),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parsed =
            parse_go_semver(s).ok_or_else(|| VersionError::InvalidSemVer(s.to_string()))?;
        Ok(Self {
            raw: s.to_string(),
            parsed,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence().cmp(&other.precedence())
    }
}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.precedence().hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Package {
    pub name: PackageName,
    pub version: SemanticVersion,
}

impl Package {
    pub fn new(name: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            name: PackageName::new(name),
            version,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Parses `name@version`, the node format used by `go mod graph`.
impl FromStr for Package {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, version) = s
            .rsplit_once('@')
            .with_context(|| anyhow!("Package reference has no version: {:?}", s))?;
        Ok(Self::new(name, version.parse()?))
    }
}
