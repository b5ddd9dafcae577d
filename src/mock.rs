//! Scripted scanner and package manager backed by a temporary project.
//!
//! Mutations append lines to `go.mod`; findings disappear when a configured
//! line shows up there (or when their ids are listed in `.nancy-ignore`).
//! Since everything is derived from the files, a rollback through
//! `History` is visible to the next scan.

use crate::backend::{PackageManager, Scanner, Vulnerability, VulnerablePackage};
use crate::errors::*;
use crate::graph::{self, DependencyEdge};
use crate::history::{GO_MOD, GO_SUM};
use crate::version::{PackageName, SemanticVersion};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const IGNORE_FILE: &str = ".nancy-ignore";

#[derive(Debug, Default, Clone)]
struct Config {
    root: String,
    graph: String,
    versions: HashMap<String, Vec<String>>,
    findings: Vec<(String, String, Vec<String>)>,
    fixes: Vec<(String, String)>,
    breaks: Vec<String>,
    unparsable_when: Vec<String>,
    failing_versions: HashSet<String>,
    failing_upgrades: HashSet<String>,
    failing_tidy: HashSet<String>,
}

pub struct MockProject {
    dir: tempfile::TempDir,
    config: Config,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockProject {
    pub fn new(root: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("nancy-fixer").tempdir()?;
        fs::write(dir.path().join(GO_MOD), format!("module {}\n", root))?;
        fs::write(dir.path().join(GO_SUM), "")?;
        Ok(Self {
            dir,
            config: Config {
                root: root.to_string(),
                ..Default::default()
            },
            calls: Arc::default(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.dir.path().join(IGNORE_FILE)
    }

    pub fn go_mod(&self) -> Result<String> {
        Ok(fs::read_to_string(self.dir.path().join(GO_MOD))?)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn graph(mut self, graph: &str) -> Self {
        self.config.graph = graph.to_string();
        self
    }

    pub fn versions(mut self, name: &str, versions: &[&str]) -> Self {
        self.config.versions.insert(
            name.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn finding(mut self, name: &str, version: &str, ids: &[&str]) -> Self {
        self.config.findings.push((
            name.to_string(),
            version.to_string(),
            ids.iter().map(|id| id.to_string()).collect(),
        ));
        self
    }

    /// The finding for `name` is gone once `line` is part of go.mod.
    pub fn fixed_by(mut self, line: &str, name: &str) -> Self {
        self.config.fixes.push((line.to_string(), name.to_string()));
        self
    }

    /// vet fails once `line` is part of go.mod.
    pub fn broken_by(mut self, line: &str) -> Self {
        self.config.breaks.push(line.to_string());
        self
    }

    pub fn unparsable_when(mut self, line: &str) -> Self {
        self.config.unparsable_when.push(line.to_string());
        self
    }

    pub fn failing_versions(mut self, name: &str) -> Self {
        self.config.failing_versions.insert(name.to_string());
        self
    }

    pub fn failing_upgrade(mut self, name: &str) -> Self {
        self.config.failing_upgrades.insert(name.to_string());
        self
    }

    pub fn failing_tidy(mut self, name: &str) -> Self {
        self.config.failing_tidy.insert(name.to_string());
        self
    }

    /// A backend serving as both scanner and package manager.
    pub fn modules(&self) -> MockBackend {
        MockBackend {
            dir: self.dir.path().to_path_buf(),
            config: Arc::new(self.config.clone()),
            calls: self.calls.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MockBackend {
    dir: PathBuf,
    config: Arc<Config>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn go_mod(&self) -> Result<String> {
        Ok(fs::read_to_string(self.dir.join(GO_MOD))?)
    }

    fn append(&self, line: String) -> Result<()> {
        let mut go_mod = self.go_mod()?;
        go_mod.push_str(&line);
        go_mod.push('\n');
        fs::write(self.dir.join(GO_MOD), go_mod)?;
        fs::write(self.dir.join(GO_SUM), format!("sum for {}\n", line))?;
        Ok(())
    }
}

#[async_trait]
impl Scanner for MockBackend {
    async fn vulnerable_packages(&self) -> Result<Vec<VulnerablePackage>> {
        self.record("scan".to_string());
        let go_mod = self.go_mod()?;
        let ignored = fs::read_to_string(self.dir.join(IGNORE_FILE)).unwrap_or_default();

        if self.config.unparsable_when.iter().any(|l| go_mod.contains(l)) {
            return Err(ScanError::Unparsable.into());
        }

        let mut packages = Vec::new();
        for (name, version, ids) in &self.config.findings {
            let fixed = self
                .config
                .fixes
                .iter()
                .any(|(line, fixed)| fixed == name && go_mod.contains(line));
            if fixed || ids.iter().all(|id| ignored.contains(id.as_str())) {
                continue;
            }
            packages.push(VulnerablePackage {
                name: PackageName::new(name.as_str()),
                version: version.parse()?,
                vulnerabilities: ids
                    .iter()
                    .map(|id| Vulnerability {
                        id: id.clone(),
                        title: format!("{} in {}", id, name),
                        description: String::new(),
                        cvss_score: "7.5".to_string(),
                    })
                    .collect(),
            });
        }
        Ok(packages)
    }
}

#[async_trait]
impl PackageManager for MockBackend {
    async fn dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        graph::parse_edges(&self.config.graph)
    }

    async fn module_name(&self) -> Result<PackageName> {
        Ok(PackageName::new(self.config.root.as_str()))
    }

    async fn list_versions(&self, name: &PackageName) -> Result<Vec<SemanticVersion>> {
        if self.config.failing_versions.contains(name.as_str()) {
            bail!("Failed to reach module proxy for {}", name);
        }
        let versions = self
            .config
            .versions
            .get(name.as_str())
            .map(|versions| versions.iter().filter_map(|v| v.parse().ok()).collect())
            .unwrap_or_default();
        Ok(versions)
    }

    async fn upgrade(&self, name: &PackageName, version: &SemanticVersion) -> Result<()> {
        self.record(format!("upgrade {}@{}", name, version));
        if self.config.failing_upgrades.contains(name.as_str()) {
            bail!("go get {}@{} failed", name, version);
        }
        self.append(format!("require {} {}", name, version))
    }

    async fn replace(&self, name: &PackageName, version: &SemanticVersion) -> Result<()> {
        self.record(format!("replace {}@{}", name, version));
        self.append(format!("replace {} => {} {}", name, name, version))?;
        if self.config.failing_tidy.contains(name.as_str()) {
            return Err(ModulesError::Tidy("missing go.sum entry".to_string()).into());
        }
        Ok(())
    }

    async fn vet_succeeds(&self) -> Result<bool> {
        self.record("vet".to_string());
        let go_mod = self.go_mod()?;
        Ok(!self.config.breaks.iter().any(|line| go_mod.contains(line)))
    }
}
