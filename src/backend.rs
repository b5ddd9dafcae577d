//! The two external tools the fixer drives: a vulnerability scanner and the
//! module-aware package manager. Both are bound to a single project directory.

use crate::errors::*;
use crate::graph::DependencyEdge;
use crate::version::{Package, PackageName, SemanticVersion};
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vulnerability {
    pub id: String,
    pub title: String,
    pub description: String,
    pub cvss_score: String,
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulnerablePackage {
    pub name: PackageName,
    pub version: SemanticVersion,
    pub vulnerabilities: Vec<Vulnerability>,
}

impl VulnerablePackage {
    pub fn to_package(&self) -> Package {
        Package {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

impl fmt::Display for VulnerablePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}-[{} vulnerabilities]",
            self.name,
            self.version,
            self.vulnerabilities.len()
        )
    }
}

pub fn contains_package(packages: &[VulnerablePackage], name: &PackageName) -> bool {
    packages.iter().any(|p| &p.name == name)
}

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scans the full dependency closure of the project.
    async fn vulnerable_packages(&self) -> Result<Vec<VulnerablePackage>>;
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Every `parent child` requirement of the module graph.
    async fn dependency_edges(&self) -> Result<Vec<DependencyEdge>>;

    /// The module path of the project itself.
    async fn module_name(&self) -> Result<PackageName>;

    /// Published versions of a module, unparsable ones are skipped.
    async fn list_versions(&self, name: &PackageName) -> Result<Vec<SemanticVersion>>;

    async fn upgrade(&self, name: &PackageName, version: &SemanticVersion) -> Result<()>;

    /// Pins `name` to `version` with a replace directive and re-resolves.
    ///
    /// A failure of the re-resolve step is reported as [`ModulesError::Tidy`].
    async fn replace(&self, name: &PackageName, version: &SemanticVersion) -> Result<()>;

    /// Static health check of the whole project.
    async fn vet_succeeds(&self) -> Result<bool>;
}
