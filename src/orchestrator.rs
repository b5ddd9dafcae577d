use crate::backend::VulnerablePackage;
use crate::errors::*;
use crate::fix::{FixResult, Fixer, Summary};
use crate::history::History;
use crate::report::Event;
use crate::version::Package;
use std::collections::BTreeSet;

fn without_evicted(
    mut packages: Vec<VulnerablePackage>,
    evicted: &BTreeSet<Package>,
) -> Vec<VulnerablePackage> {
    packages.retain(|pkg| !evicted.contains(&pkg.to_package()));
    packages
}

impl<'a> Fixer<'a> {
    /// Works through the scanner's findings until none are left.
    ///
    /// The list is re-queried after every package that was processed without
    /// an error. A package that errors is evicted for the rest of the run,
    /// unless the error is fatal, in which case the run is aborted after the
    /// project has been restored.
    pub async fn run(&self) -> Result<Summary> {
        let mut packages = self
            .scanner
            .vulnerable_packages()
            .await
            .context("Failed to scan project")?;
        info!("Found {} vulnerable packages", packages.len());

        let mut history = History::build(&self.dir)?;
        let mut summary = Summary::default();
        let mut evicted = BTreeSet::new();
        let mut iterations = 0;

        while let Some(pkg) = packages.first().cloned() {
            if let Some(max) = self.max_iterations {
                if iterations >= max {
                    warn!(
                        "Reached maximum of {} iterations, {} vulnerable packages left",
                        max,
                        packages.len()
                    );
                    break;
                }
            }
            iterations += 1;

            let before = history.push_revision(format!("Fix {}", pkg.name))?;
            self.reporter.report(&Event::Section {
                title: format!("Fixing {}@{}", pkg.name, pkg.version),
            });
            debug!("Vulnerabilities of {}: {:?}", pkg, pkg.vulnerabilities);

            match self.fix_vulnerable_package(&mut history, &pkg).await {
                Ok(result) => {
                    info!("Result for {}: {}", pkg.name, result.reason());
                    summary.update(&result);

                    let current = self
                        .scanner
                        .vulnerable_packages()
                        .await
                        .context("Failed to re-scan project")?;
                    packages = without_evicted(current, &evicted);
                    debug!("{} vulnerable packages left", packages.len());
                }
                Err(err) => {
                    summary.update(&FixResult::default());
                    error!("Failed to fix {}: {:#}", pkg, err);
                    debug!("Error details for {}: {:?}", pkg, err);

                    let err = history.rollback_after_error(before, err);
                    if is_run_fatal(&err) {
                        return Err(err);
                    }
                    evicted.insert(pkg.to_package());
                    packages.swap_remove(0);
                }
            }
        }

        self.reporter.report(&Event::Section {
            title: "Summary".to_string(),
        });
        self.reporter.report(&Event::Summary {
            summary: summary.clone(),
        });
        info!("{}", summary);
        Ok(summary)
    }
}
