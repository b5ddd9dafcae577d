use crate::backend::{PackageManager, Scanner, VulnerablePackage};
use crate::errors::*;
use crate::history::History;
use crate::ignore;
use crate::oracle;
use crate::report::Reporter;
use crate::strategy::{self, Backends, ParentOutcome, ReplaceOutcome};
use crate::version::{PackageName, SemanticVersion};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FixReason {
    #[strum(serialize = "not fixed")]
    NotFixed,
    #[strum(serialize = "fixed via replace")]
    FixedViaReplace,
    #[strum(serialize = "fixed via parent")]
    FixedViaParent,
    #[strum(serialize = "ignored")]
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixResult {
    pub replace: ReplaceOutcome,
    pub parent: ParentOutcome,
    pub ignored: bool,
}

impl FixResult {
    pub fn reason(&self) -> FixReason {
        if self.ignored {
            FixReason::Ignored
        } else if self.replace == ReplaceOutcome::Success {
            FixReason::FixedViaReplace
        } else if self.parent == ParentOutcome::Success {
            FixReason::FixedViaParent
        } else {
            FixReason::NotFixed
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.reason() != FixReason::NotFixed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub not_fixed: usize,
    pub fixed_via_replace: usize,
    pub fixed_via_parent: usize,
    pub ignored: usize,
}

impl Summary {
    pub fn update(&mut self, result: &FixResult) {
        match result.reason() {
            FixReason::NotFixed => self.not_fixed += 1,
            FixReason::FixedViaReplace => self.fixed_via_replace += 1,
            FixReason::FixedViaParent => self.fixed_via_parent += 1,
            FixReason::Ignored => self.ignored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_fixed + self.fixed_via_replace + self.fixed_via_parent + self.ignored
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "not fixed: {}, fixed via replace: {}, fixed via parent: {}, ignored: {}",
            self.not_fixed, self.fixed_via_replace, self.fixed_via_parent, self.ignored
        )
    }
}

pub struct Fixer<'a> {
    pub dir: PathBuf,
    pub ignore_file: PathBuf,
    pub max_iterations: Option<usize>,
    pub scanner: &'a dyn Scanner,
    pub modules: &'a dyn PackageManager,
    pub reporter: &'a dyn Reporter,
}

impl<'a> Fixer<'a> {
    pub(crate) fn backends(&self) -> Backends<'a> {
        Backends {
            scanner: self.scanner,
            modules: self.modules,
            reporter: self.reporter,
        }
    }

    /// Tries the parent strategy, then a forced replace, and falls back to
    /// ignoring the package's vulnerabilities.
    ///
    /// Unless the package ends up fixed, go.mod and go.sum are restored to the
    /// state before the first strategy; only the ignore file changes.
    pub async fn fix_vulnerable_package(
        &self,
        history: &mut History,
        pkg: &VulnerablePackage,
    ) -> Result<FixResult> {
        let mut result = FixResult::default();

        let root = self.modules.module_name().await?;
        let newest = oracle::update_available(self.modules, &pkg.to_package()).await?;

        if let Some(newest) = newest {
            info!("Update available: {}", newest);
            let before_update = history.push_revision(format!("Updating {}", pkg.name))?;

            match self
                .perform_update_steps(history, pkg, &root, &newest, &mut result)
                .await
            {
                Ok(()) if result.is_fixed() => return Ok(result),
                Ok(()) => history.goto_revision(before_update)?,
                Err(err) => return Err(history.rollback_after_error(before_update, err)),
            }
        } else {
            info!("No update available");
        }

        info!("Ignoring {}@{}", pkg.name, pkg.version);
        let today = chrono::Local::now().date_naive();
        ignore::ignore_vulnerabilities(
            &self.ignore_file,
            &pkg.vulnerabilities,
            &pkg.to_package(),
            today,
        )?;
        result.ignored = true;
        Ok(result)
    }

    async fn perform_update_steps(
        &self,
        history: &mut History,
        pkg: &VulnerablePackage,
        root: &PackageName,
        newest: &SemanticVersion,
        result: &mut FixResult,
    ) -> Result<()> {
        let ctx = self.backends();

        let before = history.push_revision(format!("Updating parents of {}", pkg.name))?;
        result.parent = strategy::update_parents(&ctx, pkg, root).await?;
        if result.parent == ParentOutcome::Success {
            return Ok(());
        }

        info!("Parent update failed - trying to update via replace");
        history.goto_revision(before)?;

        history.push_revision(format!("Replacing {}", pkg.name))?;
        result.replace = strategy::update_with_replace(&ctx, pkg, newest).await?;
        match result.replace {
            ReplaceOutcome::Success => info!("Update via replace successful"),
            ReplaceOutcome::DidNotFixVulnerability => {
                info!("Update via replace did not fix vulnerability")
            }
            ReplaceOutcome::BrokeBuild => info!("Update via replace broke build"),
            ReplaceOutcome::NotTried => (),
        }
        Ok(())
    }
}
