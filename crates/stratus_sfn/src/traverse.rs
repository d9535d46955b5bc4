//! Graph walks: head and root lookup, reachability, and permission aggregation.
//!
//! All walks are iterative and keep a visited set, so converging paths and
//! loops (a Choice routing back to an earlier state) terminate and visit each
//! state once.

use crate::graph::StateGraph;
use indexmap::IndexSet;
use stratus_core::{Permission, StateId};

/// First state of the chain containing `id`, following `next` back-references
#[must_use]
pub fn head(graph: &StateGraph, id: StateId) -> StateId {
    let mut seen = IndexSet::new();
    let mut current = id;
    seen.insert(current);
    while let Some(prev) = graph.predecessor(current) {
        if !seen.insert(prev) {
            // closed loop with no entry point; the starting state is as good a head as any
            return id;
        }
        current = prev;
    }
    current
}

/// Outermost state containing `id`, following both `next` back-references
/// and child-graph parents
#[must_use]
pub fn root(graph: &StateGraph, id: StateId) -> StateId {
    let mut seen = IndexSet::new();
    let mut current = id;
    seen.insert(current);
    loop {
        let up = graph.predecessor(current).or_else(|| graph.parent(current));
        match up {
            Some(next) if seen.insert(next) => current = next,
            _ => return current,
        }
    }
}

/// States reachable from `start` without leaving its graph context, in
/// structural preorder: the state, then its next chain, choice targets, and
/// catch targets
#[must_use]
pub fn reachable(graph: &StateGraph, start: StateId) -> Vec<StateId> {
    let mut visited = IndexSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        stack.extend(graph.transitions(current).into_iter().rev());
    }

    visited.into_iter().collect()
}

/// Every state of the composed graph under `start`, child graphs included,
/// in preorder
#[must_use]
pub fn composed(graph: &StateGraph, start: StateId) -> Vec<StateId> {
    let mut visited = IndexSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let mut successors = graph.transitions(current);
        successors.extend(graph.children(current));
        stack.extend(successors.into_iter().rev());
    }

    visited.into_iter().collect()
}

/// Access-policy statements needed by `start` and everything it can reach
///
/// Order is structural: a state's own statements, then its child graphs in
/// registration order, then its next chain, choice targets, and catch
/// targets. Statements are not deduplicated.
#[must_use]
pub fn permissions(graph: &StateGraph, start: StateId) -> Vec<Permission> {
    let mut visited = IndexSet::new();
    let mut stack = vec![start];
    let mut collected = Vec::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if let Some(task) = graph.node(current).and_then(|node| node.as_task()) {
            collected.extend(task.permissions.iter().cloned());
        }

        let mut successors = graph.children(current);
        successors.extend(graph.transitions(current));
        stack.extend(successors.into_iter().rev());
    }

    collected
}
