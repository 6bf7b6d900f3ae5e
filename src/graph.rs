//! Deterministic topological ordering over dependency graphs.
//!
//! The registry uses it to reject dependency cycles at warm-up, the
//! supervisor to derive start order, and the in-process event bus to derive
//! per-publish delivery order. Ties between independent nodes are broken by
//! the key's [`Ord`] implementation, so callers encode their tie-break rule
//! (priority, registration order, name) in the key type.

use std::collections::{BTreeMap, BTreeSet};

/// Nodes left unordered because they sit on, or behind, a dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected<K>(pub Vec<K>);

/// Orders `graph` so every node appears after all of its dependencies.
///
/// `graph` maps each node to the set of nodes it depends on. Dependencies
/// that are not themselves keys of `graph` are ignored; callers validate
/// membership before ordering.
///
/// # Errors
///
/// Returns [`CycleDetected`] with the unresolvable nodes when the graph
/// contains a cycle (including a self-dependency).
pub fn topological_order<K: Ord + Clone>(
    graph: &BTreeMap<K, BTreeSet<K>>,
) -> Result<Vec<K>, CycleDetected<K>> {
    let mut remaining: BTreeMap<&K, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&K, Vec<&K>> = BTreeMap::new();

    for (node, dependencies) in graph {
        let mut unresolved = 0_usize;
        for dependency in dependencies.iter().filter(|dep| graph.contains_key(*dep)) {
            unresolved = unresolved.saturating_add(1);
            dependents.entry(dependency).or_default().push(node);
        }
        remaining.insert(node, unresolved);
    }

    let mut ready: BTreeSet<&K> = remaining
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&node, _)| node)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(next) = ready.pop_first() {
        remaining.remove(&next);
        order.push(next.clone());
        for dependent in dependents.get(&next).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if remaining.is_empty() {
        Ok(order)
    } else {
        Err(CycleDetected(remaining.into_keys().cloned().collect()))
    }
}
