//! The two ways of getting rid of a vulnerable module version: upgrading the
//! direct requirements that pull it in, or forcing it with a replace directive.

use crate::backend::{self, PackageManager, Scanner, VulnerablePackage};
use crate::errors::*;
use crate::graph::{self, ReverseDependencyMap};
use crate::oracle;
use crate::report::{Event, Reporter};
use crate::version::{Package, PackageName, SemanticVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentOutcome {
    #[default]
    NotTried,
    NoUpdateAvailable,
    BrokeBuild,
    DidNotFixVulnerability,
    /// The dependency graph has no path from the root module.
    NoRootParents,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceOutcome {
    #[default]
    NotTried,
    BrokeBuild,
    DidNotFixVulnerability,
    Success,
}

pub struct Backends<'a> {
    pub scanner: &'a dyn Scanner,
    pub modules: &'a dyn PackageManager,
    pub reporter: &'a dyn Reporter,
}

pub async fn is_vulnerability_fixed(scanner: &dyn Scanner, name: &PackageName) -> Result<bool> {
    let packages = scanner.vulnerable_packages().await?;
    Ok(!backend::contains_package(&packages, name))
}

/// Upgrades every root parent of `pkg` to its newest version, in order,
/// stopping at the first one that can't be upgraded or breaks the build.
pub async fn update_parents(
    ctx: &Backends<'_>,
    pkg: &VulnerablePackage,
    root: &PackageName,
) -> Result<ParentOutcome> {
    let edges = ctx.modules.dependency_edges().await?;
    let map = ReverseDependencyMap::build(&edges);
    let parents = graph::find_root_parents(&map, &pkg.name, &pkg.version, root)?;

    if parents.is_empty() {
        error!("No root parents found, but should always be at least one");
        return Ok(ParentOutcome::NoRootParents);
    }

    ctx.reporter.report(&Event::RootParents {
        package: pkg.name.clone(),
        parents: parents.iter().cloned().collect(),
    });

    for parent in &parents {
        match update_parent_and_check(ctx, parent).await? {
            ParentOutcome::Success => (),
            outcome => return Ok(outcome),
        }
    }

    if !is_vulnerability_fixed(ctx.scanner, &pkg.name).await? {
        info!("Updating parents did not fix vulnerability");
        return Ok(ParentOutcome::DidNotFixVulnerability);
    }
    info!("Updating parents fixed vulnerability");
    Ok(ParentOutcome::Success)
}

async fn update_parent_and_check(ctx: &Backends<'_>, parent: &Package) -> Result<ParentOutcome> {
    info!("Checking updates for parent package {}", parent);
    let Some(newest) = oracle::update_available(ctx.modules, parent).await? else {
        info!("No update available for parent package {}", parent);
        return Ok(ParentOutcome::NoUpdateAvailable);
    };

    info!("Updating parent package {} to {}", parent, newest);
    if let Err(err) = ctx.modules.upgrade(&parent.name, &newest).await {
        if is_run_fatal(&err) {
            return Err(err);
        }
        // a failed upgrade can't be told apart from an upgrade that breaks the build
        debug!("Upgrading {} failed: {:#}", parent, err);
        return Ok(ParentOutcome::BrokeBuild);
    }

    if !ctx.modules.vet_succeeds().await? {
        info!("Parent update broke build");
        return Ok(ParentOutcome::BrokeBuild);
    }
    Ok(ParentOutcome::Success)
}

/// Pins the vulnerable module to `newest` and checks the result.
pub async fn update_with_replace(
    ctx: &Backends<'_>,
    pkg: &VulnerablePackage,
    newest: &SemanticVersion,
) -> Result<ReplaceOutcome> {
    info!("Replacing {} with {}@{}", pkg.name, pkg.name, newest);
    if let Err(err) = ctx.modules.replace(&pkg.name, newest).await {
        if err.downcast_ref::<ModulesError>().is_some() {
            debug!("Replace of {} failed to resolve: {:#}", pkg.name, err);
            return Ok(ReplaceOutcome::BrokeBuild);
        }
        return Err(err);
    }

    if !is_vulnerability_fixed(ctx.scanner, &pkg.name).await? {
        return Ok(ReplaceOutcome::DidNotFixVulnerability);
    }
    if !ctx.modules.vet_succeeds().await? {
        return Ok(ReplaceOutcome::BrokeBuild);
    }
    Ok(ReplaceOutcome::Success)
}
