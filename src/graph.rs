//! Reverse traversal of the module requirement graph.
//!
//! Nodes are kept as the raw `name@version` strings printed by `go mod graph`,
//! the root module is the only node without a version.

use crate::errors::*;
use crate::version::{Package, PackageName, SemanticVersion};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DependencyEdge {
    pub parent: String,
    pub child: String,
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

impl FromStr for DependencyEdge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s.split(' ').collect::<Vec<_>>();
        if let [parent, child] = parts[..] {
            Ok(Self {
                parent: parent.to_string(),
                child: child.to_string(),
            })
        } else {
            Err(GraphError::InvalidDependencyLine(s.to_string()).into())
        }
    }
}

pub fn parse_edges(output: &str) -> Result<Vec<DependencyEdge>> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(DependencyEdge::from_str)
        .collect()
}

/// child -> [parent1, parent2, ...]
#[derive(Debug, Default)]
pub struct ReverseDependencyMap {
    parents: HashMap<String, Vec<String>>,
}

impl ReverseDependencyMap {
    pub fn build(edges: &[DependencyEdge]) -> Self {
        let mut parents = HashMap::<String, Vec<String>>::new();
        for edge in edges {
            parents
                .entry(edge.child.clone())
                .or_default()
                .push(edge.parent.clone());
        }
        Self { parents }
    }

    pub fn parents_of(&self, node: &str) -> &[String] {
        self.parents.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// The target node plus every installed node of the same module with a
    /// lower version. Stale copies still have to be upgraded away.
    fn seed_nodes(&self, name: &PackageName, version: &SemanticVersion) -> Result<Vec<String>> {
        let mut seeds = vec![format!("{}@{}", name, version)];

        let mut stale = Vec::new();
        for node in self.parents.keys() {
            if !is_node_of(node, name) {
                continue;
            }
            let Some((_, node_version)) = node.rsplit_once('@') else {
                continue;
            };
            let node_version = node_version
                .parse::<SemanticVersion>()
                .with_context(|| anyhow!("Invalid version in dependency graph node {:?}", node))?;
            if node_version < *version {
                stale.push(node.clone());
            }
        }
        stale.sort();
        seeds.extend(stale);

        Ok(seeds)
    }
}

fn is_node_of(node: &str, name: &PackageName) -> bool {
    node.rsplit_once('@')
        .map(|(node_name, _)| node_name == name.as_str())
        .unwrap_or(false)
}

/// Returns the direct requirements of `root` that lead to the given package,
/// either at its current version or at any lower version still in the graph.
///
/// The result is ordered by module name and version.
pub fn find_root_parents(
    map: &ReverseDependencyMap,
    name: &PackageName,
    version: &SemanticVersion,
    root: &PackageName,
) -> Result<BTreeSet<Package>> {
    let seeds = map.seed_nodes(name, version)?;

    let mut selected = seeds.iter().cloned().collect::<HashSet<_>>();
    let mut unvisited = VecDeque::from(seeds);
    let mut root_parents = BTreeSet::new();

    while let Some(current) = unvisited.pop_front() {
        for parent in map.parents_of(&current) {
            if parent == root.as_str() {
                // a direct requirement on the vulnerable module itself is not a parent
                if !is_node_of(&current, name) {
                    root_parents.insert(current.clone());
                }
                continue;
            }
            if selected.insert(parent.clone()) {
                unvisited.push_back(parent.clone());
            }
        }
    }

    root_parents
        .iter()
        .map(|node| {
            node.parse::<Package>()
                .with_context(|| anyhow!("Invalid root parent in dependency graph: {:?}", node))
        })
        .collect()
}
