use crate::backend::PackageManager;
use crate::errors::*;
use crate::version::{Package, PackageName, SemanticVersion};

/// The highest published release, prereleases are never considered.
///
/// Modules that only have pseudo-versions or prereleases have no release.
pub async fn newest_version(
    modules: &dyn PackageManager,
    name: &PackageName,
) -> Result<Option<SemanticVersion>> {
    let versions = modules.list_versions(name).await?;
    let newest = versions.into_iter().filter(|v| !v.is_prerelease()).max();
    if newest.is_none() {
        debug!("No released versions found for {}", name);
    }
    Ok(newest)
}

/// Returns the newest version if it's newer than the installed one.
pub async fn update_available(
    modules: &dyn PackageManager,
    pkg: &Package,
) -> Result<Option<SemanticVersion>> {
    let newest = newest_version(modules, &pkg.name).await?;
    Ok(newest.filter(|newest| pkg.version < *newest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProject;

    #[tokio::test]
    async fn test_newest_version_skips_prereleases() -> Result<()> {
        let project = MockProject::new("example.com/root")?
            .versions("a.io/x", &["v1.0.0", "v1.2.0", "v1.10.0", "v2.0.0-rc.1"]);
        let newest = newest_version(&project.modules(), &"a.io/x".into()).await?;
        assert_eq!(newest.map(|v| v.to_string()), Some("v1.10.0".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_versions() -> Result<()> {
        let project = MockProject::new("example.com/root")?
            .versions("a.io/rc", &["v0.1.0-rc.1", "v0.2.0-rc.1"]);
        let modules = project.modules();
        assert_eq!(newest_version(&modules, &"a.io/x".into()).await?, None);
        assert_eq!(newest_version(&modules, &"a.io/rc".into()).await?, None);

        let untagged = Package::new("a.io/x", "v0.0.0-20230101000000-abcdefabcdef".parse()?);
        assert_eq!(update_available(&modules, &untagged).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_lookup_is_an_error() -> Result<()> {
        let project = MockProject::new("example.com/root")?.failing_versions("a.io/x");
        let pkg = Package::new("a.io/x", "v1.0.0".parse()?);
        assert!(update_available(&project.modules(), &pkg).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_available() -> Result<()> {
        let project = MockProject::new("example.com/root")?.versions("a.io/x", &["v1.0.0", "v1.2.0"]);
        let modules = project.modules();

        let old = Package::new("a.io/x", "v1.0.0".parse()?);
        let update = update_available(&modules, &old).await?;
        assert_eq!(update.map(|v| v.to_string()), Some("v1.2.0".to_string()));

        let current = Package::new("a.io/x", "v1.2.0".parse()?);
        assert_eq!(update_available(&modules, &current).await?, None);
        Ok(())
    }
}
