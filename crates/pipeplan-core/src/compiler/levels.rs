//! Dependency levels of resource groups.
//!
//! Groups are nodes of a DAG where an edge `A → B` means "B depends on A".
//! Levels come from Kahn's algorithm processed in waves: a group's level is
//! one more than the deepest group it depends on, so same-level groups are
//! independent and may share a run order.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::resource::ResourceGroup;

use super::error::{CompileError, CompileResult};

/// Level of every group in `groups`, starting at 0.
pub fn resource_levels(groups: &[ResourceGroup]) -> CompileResult<BTreeMap<ResourceGroup, u32>> {
    levels_from_edges(groups, |group| group.depends_on())
}

/// Level computation over an arbitrary dependency function.
pub(crate) fn levels_from_edges<'a, F>(
    groups: &[ResourceGroup],
    depends_on: F,
) -> CompileResult<BTreeMap<ResourceGroup, u32>>
where
    F: Fn(&ResourceGroup) -> &'a [ResourceGroup],
{
    let members: BTreeSet<ResourceGroup> = groups.iter().copied().collect();

    // `dependency → dependents` adjacency and in-degrees.
    let mut downstream: BTreeMap<ResourceGroup, BTreeSet<ResourceGroup>> = BTreeMap::new();
    let mut in_degree: BTreeMap<ResourceGroup, usize> =
        members.iter().map(|g| (*g, 0)).collect();

    for group in &members {
        for dep in depends_on(group) {
            if !members.contains(dep) {
                return Err(CompileError::UnresolvedDependency {
                    group: group.to_string(),
                    dependency: dep.to_string(),
                });
            }
            if downstream.entry(*dep).or_default().insert(*group) {
                *in_degree.entry(*group).or_default() += 1;
            }
        }
    }

    let mut levels = BTreeMap::new();
    let mut wave: Vec<ResourceGroup> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(g, _)| *g)
        .collect();
    let mut level = 0u32;

    while !wave.is_empty() {
        let mut next = Vec::new();
        for group in &wave {
            levels.insert(*group, level);
            if let Some(dependents) = downstream.get(group) {
                for dependent in dependents {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
        }
        next.sort_unstable();
        wave = next;
        level += 1;
    }

    if levels.len() != members.len() {
        let groups = members
            .iter()
            .filter(|g| !levels.contains_key(*g))
            .map(ToString::to_string)
            .collect();
        return Err(CompileError::DependencyCycle { groups });
    }

    Ok(levels)
}
