//! Maintenance of the `.nancy-ignore` suppression file.
//!
//! Entries look like `CVE-2022-29153 until=2023-06-01 # github.com/hashicorp/consul/api@v1.20.0`.

use crate::backend::Vulnerability;
use crate::errors::*;
use crate::version::Package;
use chrono::{Days, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_IGNORE_PATH: &str = ".nancy-ignore";
pub const IGNORE_PERIOD_DAYS: u64 = 30;
const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref ENTRY_RE: Regex = Regex::new(r"^(\S+)\s+until=(\S+)(?:\s+#\s*(.*))?$").unwrap();
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct IgnoreEntry {
    pub id: String,
    pub until: String,
    pub annotation: Option<String>,
}

impl IgnoreEntry {
    pub fn new(id: &str, pkg: &Package, today: NaiveDate) -> Self {
        let until = today + Days::new(IGNORE_PERIOD_DAYS);
        Self {
            id: id.to_string(),
            until: until.format(DATE_FORMAT).to_string(),
            annotation: Some(pkg.to_string()),
        }
    }

    /// An entry whose date can't be parsed counts as expired.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match NaiveDate::parse_from_str(&self.until, DATE_FORMAT) {
            Ok(until) => today >= until,
            Err(_) => true,
        }
    }

    pub fn to_line(&self) -> String {
        match &self.annotation {
            Some(annotation) => format!("{} until={} # {}", self.id, self.until, annotation),
            None => format!("{} until={}", self.id, self.until),
        }
    }
}

impl FromStr for IgnoreEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = ENTRY_RE
            .captures(s.trim())
            .with_context(|| anyhow!("Invalid ignore entry: {:?}", s))?;
        Ok(Self {
            id: caps[1].to_string(),
            until: caps[2].to_string(),
            annotation: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }
}

struct Line {
    raw: String,
    entry: IgnoreEntry,
    renewed: bool,
}

/// Renews matching entries in place, drops expired ones that no longer
/// match anything and appends entries for vulnerabilities seen for the
/// first time. Lines that aren't entries are dropped.
pub fn update_lines(
    lines: &[&str],
    vulnerabilities: &[Vulnerability],
    pkg: &Package,
    today: NaiveDate,
) -> Vec<String> {
    let mut lines = lines
        .iter()
        .filter_map(|raw| {
            let entry = raw.parse::<IgnoreEntry>().ok()?;
            Some(Line {
                raw: raw.to_string(),
                entry,
                renewed: false,
            })
        })
        .collect::<Vec<_>>();

    let mut unhandled = Vec::<&Vulnerability>::new();
    for vulnerability in vulnerabilities {
        // NOTE: substring match, an id that's a prefix of another id matches the wrong line
        let existing = lines
            .iter()
            .position(|line| line.raw.contains(vulnerability.id.as_str()));

        let renewed = IgnoreEntry::new(&vulnerability.id, pkg, today);
        if let Some(idx) = existing {
            lines[idx] = Line {
                raw: renewed.to_line(),
                entry: renewed,
                renewed: true,
            };
        } else if !unhandled.iter().any(|v| v.id == vulnerability.id) {
            unhandled.push(vulnerability);
        }
    }

    let mut updated = lines
        .into_iter()
        .filter(|line| line.renewed || !line.entry.is_expired(today))
        .map(|line| line.raw)
        .collect::<Vec<_>>();

    for vulnerability in unhandled {
        updated.push(IgnoreEntry::new(&vulnerability.id, pkg, today).to_line());
    }

    updated
}

pub fn ignore_vulnerabilities(
    path: &Path,
    vulnerabilities: &[Vulnerability],
    pkg: &Package,
    today: NaiveDate,
) -> Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(Error::new(err).context(format!("Failed to read {:?}", path)));
        }
    };

    let lines = content.lines().collect::<Vec<_>>();
    let mut updated = update_lines(&lines, vulnerabilities, pkg, today).join("\n");
    if !updated.is_empty() {
        updated.push('\n');
    }

    debug!("Writing {} ignore entries to {:?}", updated.lines().count(), path);
    fs::write(path, updated).with_context(|| anyhow!("Failed to write {:?}", path))
}
