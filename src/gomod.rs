use crate::backend::PackageManager;
use crate::errors::*;
use crate::graph::{self, DependencyEdge};
use crate::version::{PackageName, SemanticVersion};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const GO: &str = "go";

/// Runs the go binary at `go` and returns stdout.
///
/// Anything on stderr is reported as [`ToolError::Stderr`] even if the
/// process succeeded, callers decide whether that matters.
pub async fn exec_go(go: &Path, dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(go);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    trace!("Running go {:?}", args);
    let child = cmd.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::new(ToolError::NotFound(GO.to_string()))
        } else {
            Error::new(err).context(format!("Failed to run {:?}", go))
        }
    })?;

    let out = child.wait_with_output().await?;
    let stdout = String::from_utf8(out.stdout).context("Go output contains invalid utf8")?;
    let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
    let args = args.iter().map(|a| a.to_string()).collect();

    if !out.status.success() {
        return Err(ToolError::Failed {
            tool: GO.to_string(),
            args,
            stderr,
        }
        .into());
    }
    if !stderr.is_empty() {
        return Err(ToolError::Stderr {
            tool: GO.to_string(),
            args,
            stdout,
            stderr,
        }
        .into());
    }

    Ok(stdout)
}

fn is_stderr_only(err: &Error) -> bool {
    matches!(err.downcast_ref::<ToolError>(), Some(ToolError::Stderr { .. }))
}

pub fn parse_module_list(output: &str) -> Result<PackageName> {
    let lines = output.lines().collect::<Vec<_>>();
    if let [name] = lines[..] {
        Ok(PackageName::new(name))
    } else {
        Err(GraphError::InvalidModuleList(output.to_string()).into())
    }
}

/// `go list -m -versions <name>` prints the module path followed by versions.
pub fn parse_versions(output: &str) -> Vec<SemanticVersion> {
    output
        .split_whitespace()
        .filter_map(|word| word.parse().ok())
        .collect()
}

#[derive(Debug, Clone)]
pub struct GoModules {
    dir: PathBuf,
    go: PathBuf,
}

impl GoModules {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            go: PathBuf::from(GO),
        }
    }

    /// Uses a different go binary than the one on `PATH`.
    pub fn with_go(mut self, go: impl Into<PathBuf>) -> Self {
        self.go = go.into();
        self
    }

    async fn go(&self, args: &[&str]) -> Result<String> {
        exec_go(&self.go, Some(&self.dir), args).await
    }

    async fn tidy(&self) -> Result<()> {
        self.go(&["mod", "tidy"]).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageManager for GoModules {
    async fn dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        let out = self.go(&["mod", "graph"]).await?;
        graph::parse_edges(&out)
    }

    async fn module_name(&self) -> Result<PackageName> {
        let out = self.go(&["list", "-m"]).await?;
        parse_module_list(&out)
    }

    async fn list_versions(&self, name: &PackageName) -> Result<Vec<SemanticVersion>> {
        // runs outside the project so the module proxy is queried directly
        let out = exec_go(&self.go, None, &["list", "-m", "-versions", name.as_str()])
            .await
            .with_context(|| anyhow!("Failed to list versions of {}", name))?;
        Ok(parse_versions(&out))
    }

    async fn upgrade(&self, name: &PackageName, version: &SemanticVersion) -> Result<()> {
        let target = format!("{}@{}", name, version);
        // go get reports progress on stderr
        match self.go(&["get", &target]).await {
            Err(err) if !is_stderr_only(&err) => return Err(err),
            _ => (),
        }
        self.tidy().await
    }

    async fn replace(&self, name: &PackageName, version: &SemanticVersion) -> Result<()> {
        let directive = format!("{}={}@{}", name, name, version);
        self.go(&["mod", "edit", "-replace", &directive]).await?;
        self.tidy()
            .await
            .map_err(|err| ModulesError::Tidy(format!("{:#}", err)).into())
    }

    async fn vet_succeeds(&self) -> Result<bool> {
        match self.go(&["vet", "./..."]).await {
            Ok(_) => Ok(true),
            Err(err) if err.is::<ToolError>() && !is_run_fatal(&err) => {
                debug!("go vet failed: {:#}", err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
