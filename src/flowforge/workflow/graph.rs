// SPDX-License-Identifier: MIT

//! Adjacency construction and ordering shared by the validator,
//! transformer and executor.
//!
//! Nothing here keeps a reference to the caller's nodes or edges past the
//! call. Self-loops stay in the adjacency lists but never count as a
//! dependency: cycle detection and ordering skip them.

use std::collections::{HashMap, HashSet};

use super::types::{Edge, Node};
use crate::cdk::error::WorkflowError;

/// Node id -> neighbour ids, in edge order
pub type Adjacency = HashMap<String, Vec<String>>;

/// Forward adjacency (source -> targets).
///
/// Every node gets an entry, isolated ones an empty list. Edges whose
/// source or target is not a node of the graph are skipped.
pub fn build_adjacency(nodes: &[Node], edges: &[Edge]) -> Adjacency {
    build(nodes, edges, |e| (&e.source, &e.target))
}

/// Reverse adjacency (target -> sources), used to find a node's parents
pub fn build_reverse_adjacency(nodes: &[Node], edges: &[Edge]) -> Adjacency {
    build(nodes, edges, |e| (&e.target, &e.source))
}

fn build<F>(nodes: &[Node], edges: &[Edge], endpoints: F) -> Adjacency
where
    F: Fn(&Edge) -> (&String, &String),
{
    let mut adjacency: Adjacency = nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();

    for edge in edges {
        let (from, to) = endpoints(edge);
        if !adjacency.contains_key(to) {
            continue;
        }
        if let Some(list) = adjacency.get_mut(from) {
            list.push(to.clone());
        }
    }

    adjacency
}

/// Ids of nodes with no incoming edge, in node order
pub fn root_ids(nodes: &[Node], edges: &[Edge]) -> Vec<String> {
    let targets: HashSet<&str> = edges.iter().map(|e| e.target.as_str()).collect();
    nodes
        .iter()
        .filter(|n| !targets.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Color {
    White,
    /// On the DFS path, at this depth of the frame stack
    Gray(usize),
    Black,
}

/// Three-color depth-first search over all nodes.
///
/// Returns the cycle path (first node repeated at the end) as soon as a
/// back-edge to a gray node is found.
pub fn find_cycle(nodes: &[Node], adjacency: &Adjacency) -> Option<Vec<String>> {
    topological_order(nodes, adjacency).err().map(|e| match e {
        WorkflowError::CycleDetected(path) => path,
    })
}

/// DFS-based topological sort (reverse post-order).
///
/// Roots are tried in node order, so the result is deterministic for a
/// given input.
pub fn topological_order(
    nodes: &[Node],
    adjacency: &Adjacency,
) -> Result<Vec<String>, WorkflowError> {
    let mut colors: HashMap<&str, Color> =
        nodes.iter().map(|n| (n.id.as_str(), Color::White)).collect();
    let mut post_order: Vec<String> = Vec::with_capacity(nodes.len());

    for node in nodes {
        if colors.get(node.id.as_str()) == Some(&Color::White) {
            visit(&node.id, adjacency, &mut colors, &mut post_order)
                .map_err(WorkflowError::CycleDetected)?;
        }
    }

    post_order.reverse();
    Ok(post_order)
}

/// Iterative DFS from `root`. Each frame is a node id and the index of the
/// next outgoing edge to follow.
fn visit<'a>(
    root: &'a str,
    adjacency: &'a Adjacency,
    colors: &mut HashMap<&'a str, Color>,
    post_order: &mut Vec<String>,
) -> Result<(), Vec<String>> {
    let mut frames: Vec<(&'a str, usize)> = vec![(root, 0)];
    colors.insert(root, Color::Gray(0));

    while let Some(frame) = frames.last_mut() {
        let (id, next_index) = *frame;

        let Some(next) = adjacency.get(id).and_then(|t| t.get(next_index)) else {
            frames.pop();
            colors.insert(id, Color::Black);
            post_order.push(id.to_string());
            continue;
        };
        frame.1 += 1;

        if next == id {
            continue;
        }
        match colors.get(next.as_str()).copied().unwrap_or(Color::White) {
            Color::Gray(depth) => {
                let mut cycle: Vec<String> =
                    frames[depth..].iter().map(|(s, _)| s.to_string()).collect();
                cycle.push(next.clone());
                return Err(cycle);
            }
            Color::White => {
                colors.insert(next.as_str(), Color::Gray(frames.len()));
                frames.push((next.as_str(), 0));
            }
            Color::Black => {}
        }
    }

    Ok(())
}

/// Group a topological order into dependency levels.
///
/// Every node lands one level after its deepest predecessor, so nodes
/// within a level have no edges between them.
pub fn dependency_levels(order: &[String], reverse: &Adjacency) -> Vec<Vec<String>> {
    let mut level_of: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    for id in order {
        let level = reverse
            .get(id)
            .into_iter()
            .flatten()
            .filter(|p| p.as_str() != id.as_str())
            .filter_map(|p| level_of.get(p.as_str()))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);

        level_of.insert(id, level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(id.clone());
    }

    levels
}
