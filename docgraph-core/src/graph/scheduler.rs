//! Invalidation Scheduler
//!
//! Decides the order in which documents are ranked and invalidated. It
//! ensures that dependencies always come before their dependents.
//!
//! # Ranking
//!
//! Ranks are assigned level by level with Kahn's algorithm:
//!
//! 1. Every node with no dependencies forms the first block.
//! 2. Removing a block releases the nodes whose dependencies are now all
//!    ranked; they form the next block.
//! 3. Within a block, nodes are ranked by ascending index, so the order is
//!    stable for a given registration set.
//!
//! If the frontier empties while unranked nodes remain, every remaining node
//! still waits on another remaining node, which means the declarations
//! contain a cycle. The build fails instead of leaving ranks undefined.
//!
//! # Impact sets
//!
//! The impact set of a change is every node reachable from the changed nodes
//! by following `dependents` edges, the changed nodes included. It is
//! returned sorted by rank.

use super::node::Node;
use crate::error::{GraphError, GraphResult};

/// Assign a rank to every node and return the topological order.
pub(crate) fn assign_ranks(nodes: &mut [Node]) -> GraphResult<Vec<usize>> {
    let mut pending: Vec<usize> = nodes.iter().map(|n| n.dependencies().len()).collect();
    let mut order = Vec::with_capacity(nodes.len());

    let mut frontier: Vec<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &index in &frontier {
            nodes[index].set_rank(order.len());
            order.push(index);

            for &dependent in nodes[index].dependents() {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        frontier = next;
    }

    if order.len() < nodes.len() {
        return Err(GraphError::Cycle {
            path: find_cycle(nodes, &pending),
        });
    }

    Ok(order)
}

/// Walk dependency edges among the unranked nodes until one repeats.
///
/// Each unranked node has at least one unranked dependency, so the walk
/// cannot dead-end. The returned path starts and ends with the same name;
/// `a -> b` reads "a depends on b".
fn find_cycle(nodes: &[Node], pending: &[usize]) -> Vec<String> {
    let unranked = |i: usize| pending[i] > 0;

    let Some(start) = (0..nodes.len()).find(|&i| unranked(i)) else {
        return Vec::new();
    };

    let mut position = vec![None; nodes.len()];
    let mut walk = Vec::new();
    let mut current = start;

    loop {
        if let Some(at) = position[current] {
            let mut path: Vec<String> = walk[at..]
                .iter()
                .map(|&i: &usize| nodes[i].name().to_string())
                .collect();
            path.push(nodes[current].name().to_string());
            return path;
        }
        position[current] = Some(walk.len());
        walk.push(current);

        match nodes[current]
            .dependencies()
            .iter()
            .copied()
            .find(|&d| unranked(d))
        {
            Some(dependency) => current = dependency,
            None => return walk.iter().map(|&i| nodes[i].name().to_string()).collect(),
        }
    }
}

/// Every node reachable from `seeds` through dependents, sorted by rank.
///
/// Seeds out of range are ignored. Duplicate seeds collapse.
pub(crate) fn impact_set<I>(nodes: &[Node], seeds: I) -> Vec<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<usize> = seeds.into_iter().filter(|&i| i < nodes.len()).collect();
    let mut impacted = Vec::new();

    while let Some(index) = stack.pop() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        impacted.push(index);

        stack.extend(
            nodes[index]
                .dependents()
                .iter()
                .copied()
                .filter(|&d| !visited[d]),
        );
    }

    impacted.sort_unstable_by_key(|&i| (nodes[i].rank(), i));
    impacted
}
