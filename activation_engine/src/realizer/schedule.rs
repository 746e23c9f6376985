//! Dependency ordering of a container's children.
//!
//! Kahn's algorithm over an ordered ready set. `petgraph::algo::toposort`
//! breaks ties by insertion order, not by symbol, so it is not used here.

use construct_model::ConstructSymbol;
use std::collections::{BTreeMap, BTreeSet};

/// Order `nodes` so every edge `(upstream, downstream)` has the upstream
/// first. Among nodes that are free to run, the smallest symbol runs first,
/// so the order depends only on the graph.
///
/// Edges naming symbols outside `nodes` are ignored. On a cycle, returns the
/// symbols that could not be ordered.
pub fn topological_order<'a>(
    nodes: impl IntoIterator<Item = &'a ConstructSymbol>,
    edges: impl IntoIterator<Item = (&'a ConstructSymbol, &'a ConstructSymbol)>,
) -> Result<Vec<ConstructSymbol>, Vec<ConstructSymbol>> {
    let mut in_degree: BTreeMap<&ConstructSymbol, usize> =
        nodes.into_iter().map(|node| (node, 0)).collect();
    let mut downstream: BTreeMap<&ConstructSymbol, BTreeSet<&ConstructSymbol>> = BTreeMap::new();

    for (from, to) in edges {
        if from == to || !in_degree.contains_key(from) {
            continue;
        }
        let Some(degree) = in_degree.get_mut(to) else {
            continue;
        };
        if downstream.entry(from).or_default().insert(to) {
            *degree += 1;
        }
    }

    let mut free: BTreeSet<&ConstructSymbol> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(node) = free.pop_first() {
        order.push(node.clone());
        for next in downstream.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    free.insert(next);
                }
            }
        }
    }

    if order.len() == in_degree.len() {
        Ok(order)
    } else {
        Err(in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(node, _)| node.clone())
            .collect())
    }
}
