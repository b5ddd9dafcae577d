use crate::backend::{Scanner, Vulnerability, VulnerablePackage};
use crate::errors::*;
use crate::version::PackageName;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

const GO_LIST_ARGS: &[&str] = &["list", "-json", "-deps", "./..."];
const SLEUTH_ARGS: &[&str] = &[
    "sleuth",
    "--skip-update-check",
    "--quiet",
    "--no-color",
    "--additional-exclude-vulnerability-files=./.nancy-ignore.generated",
    "--output=json-pretty",
];

#[derive(Debug, Default, Deserialize)]
pub struct SleuthOutput {
    #[serde(default)]
    pub vulnerable: Vec<PackageReport>,
    #[serde(default)]
    pub excluded: Vec<PackageReport>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub num_audited: usize,
    #[serde(default)]
    pub num_vulnerable: usize,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageReport {
    pub coordinates: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub vulnerabilities: Vec<VulnerabilityReport>,
    #[serde(default)]
    pub invalid_sem_ver: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VulnerabilityReport {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cvss_score: String,
    #[serde(default)]
    pub cve: String,
    #[serde(default)]
    pub excluded: bool,
}

/// `pkg:golang/github.com/hashicorp/consul/api@v1.20.0`
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Coordinates {
    pub name: String,
    pub version: String,
}

impl FromStr for Coordinates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, version) = s
            .split_once('@')
            .ok_or_else(|| ScanError::InvalidCoordinates(s.to_string()))?;
        let name = name.strip_prefix("pkg:golang/").unwrap_or(name);
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

pub fn parse_output(buf: &[u8]) -> Result<SleuthOutput> {
    serde_json::from_slice(buf).map_err(|err| {
        debug!("Failed to deserialize nancy output: {:#}", err);
        Error::new(ScanError::Unparsable)
    })
}

pub fn extract_vulnerable_packages(output: SleuthOutput) -> Result<Vec<VulnerablePackage>> {
    output
        .vulnerable
        .into_iter()
        .map(|report| {
            let coordinates = report.coordinates.parse::<Coordinates>()?;
            let version = coordinates.version.parse().with_context(|| {
                anyhow!("Invalid version in nancy coordinates {:?}", report.coordinates)
            })?;
            let vulnerabilities = report
                .vulnerabilities
                .into_iter()
                .map(|v| Vulnerability {
                    id: v.id,
                    title: v.title,
                    description: v.description,
                    cvss_score: v.cvss_score,
                })
                .collect();
            Ok(VulnerablePackage {
                name: PackageName::new(coordinates.name),
                version,
                vulnerabilities,
            })
        })
        .collect()
}

fn spawn_error(tool: &str, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::new(ToolError::NotFound(tool.to_string()))
    } else {
        Error::new(err).context(format!("Failed to run {}", tool))
    }
}

/// Runs `go list -json -deps ./... | nancy sleuth` inside the project.
#[derive(Debug, Clone)]
pub struct Nancy {
    dir: PathBuf,
    ignore_file: PathBuf,
}

impl Nancy {
    pub fn new(dir: &Path, ignore_file: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ignore_file: ignore_file.to_path_buf(),
        }
    }

    fn sleuth_args(&self) -> Vec<String> {
        let mut args = SLEUTH_ARGS.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        args.insert(
            1,
            format!("--exclude-vulnerability-file={}", self.ignore_file.display()),
        );
        args
    }

    pub async fn sleuth(&self) -> Result<SleuthOutput> {
        debug!("Running go {:?}", GO_LIST_ARGS);
        let mut go = Command::new("go")
            .args(GO_LIST_ARGS)
            .current_dir(&self.dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error("go", err))?;

        let deps: Stdio = go
            .stdout
            .take()
            .context("Failed to capture stdout of go list")?
            .try_into()
            .context("Failed to connect go list to nancy")?;

        let sleuth_args = self.sleuth_args();
        debug!("Running nancy {:?}", sleuth_args);
        let nancy = Command::new("nancy")
            .args(&sleuth_args)
            .current_dir(&self.dir)
            .stdin(deps)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error("nancy", err))?;

        let (go, nancy) = tokio::try_join!(go.wait_with_output(), nancy.wait_with_output())
            .context("Failed to wait for go list and nancy")?;

        if !go.status.success() {
            let stderr = String::from_utf8_lossy(&go.stderr);
            debug!("go list failed: {}", stderr);
            return Err(ToolError::Failed {
                tool: "go".to_string(),
                args: GO_LIST_ARGS.iter().map(|a| a.to_string()).collect(),
                stderr: stderr.into_owned(),
            }
            .into());
        }

        // nancy's exit code doesn't reliably tell apart findings and failures
        if !nancy.status.success() {
            debug!("nancy exited with {:?}", nancy.status);
        }

        debug!("Parsing nancy output");
        parse_output(&nancy.stdout).map_err(|err| {
            error!("Failed parsing nancy output");
            if !nancy.stderr.is_empty() {
                error!("nancy stderr: {}", String::from_utf8_lossy(&nancy.stderr));
            }
            err
        })
    }
}

#[async_trait]
impl Scanner for Nancy {
    async fn vulnerable_packages(&self) -> Result<Vec<VulnerablePackage>> {
        debug!("Running nancy sleuth...");
        let output = self.sleuth().await?;
        debug!(
            "nancy audited {} packages, {} vulnerable",
            output.num_audited, output.num_vulnerable
        );
        extract_vulnerable_packages(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
  "audited": [],
  "excluded": [],
  "exclusions": ["CVE-2020-1234"],
  "invalid": [],
  "num_audited": 42,
  "num_exclusions": 1,
  "num_vulnerable": 1,
  "version": "1.0.42",
  "vulnerable": [
    {
      "Coordinates": "pkg:golang/golang.org/x/net@v0.7.0",
      "Reference": "https://ossindex.sonatype.org/component/pkg:golang/golang.org/x/net@v0.7.0",
      "Vulnerabilities": [
        {
          "ID": "CVE-2023-39325",
          "Title": "[CVE-2023-39325] CWE-770",
          "Description": "A malicious HTTP/2 client which rapidly creates requests...",
          "CvssScore": "7.5",
          "CvssVector": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:H",
          "Cve": "CVE-2023-39325",
          "Reference": "https://ossindex.sonatype.org/vulnerability/CVE-2023-39325",
          "Excluded": false
        }
      ],
      "InvalidSemVer": false
    }
  ]
}"#;

    #[test]
    fn test_parse_report() -> Result<()> {
        let output = parse_output(REPORT.as_bytes())?;
        assert_eq!(output.num_audited, 42);
        assert_eq!(output.exclusions, vec!["CVE-2020-1234".to_string()]);

        let packages = extract_vulnerable_packages(output)?;
        assert_eq!(packages.len(), 1);
        let pkg = &packages[0];
        assert_eq!(pkg.name.as_str(), "golang.org/x/net");
        assert_eq!(pkg.version.as_str(), "v0.7.0");
        assert_eq!(pkg.vulnerabilities[0].id, "CVE-2023-39325");
        assert_eq!(pkg.vulnerabilities[0].cvss_score, "7.5");
        assert_eq!(pkg.to_string(), "golang.org/x/net@v0.7.0-[1 vulnerabilities]");
        Ok(())
    }

    #[test]
    fn test_parse_empty_report() -> Result<()> {
        let output = parse_output(br#"{"audited": [], "vulnerable": [], "num_audited": 3}"#)?;
        assert!(extract_vulnerable_packages(output)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unparsable_report() {
        let err = parse_output(b"nancy: error: no such flag").unwrap_err();
        assert!(is_scan_unparsable(&err));
    }

    #[test]
    fn test_coordinates() -> Result<()> {
        let c: Coordinates = "pkg:golang/github.com/hashicorp/consul/api@v1.20.0".parse()?;
        assert_eq!(
            c,
            Coordinates {
                name: "github.com/hashicorp/consul/api".to_string(),
                version: "v1.20.0".to_string(),
            }
        );
        assert!("pkg:golang/github.com/hashicorp/consul/api".parse::<Coordinates>().is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_version_in_report() -> Result<()> {
        let output = parse_output(
            br#"{"vulnerable": [{"Coordinates": "pkg:golang/a.io/x@master", "Vulnerabilities": []}]}"#,
        )?;
        assert!(extract_vulnerable_packages(output).is_err());
        Ok(())
    }

    #[test]
    fn test_sleuth_args() {
        let nancy = Nancy::new(Path::new("/src/app"), Path::new("/src/app/.nancy-ignore"));
        let args = nancy.sleuth_args();
        assert_eq!(args[0], "sleuth");
        assert_eq!(args[1], "--exclude-vulnerability-file=/src/app/.nancy-ignore");
        assert_eq!(args.last().map(String::as_str), Some("--output=json-pretty"));
    }
}
