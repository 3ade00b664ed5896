// SPDX-License-Identifier: MIT

//! Workflow transformation - optimization, hierarchy conversion and metrics
//!
//! These functions do not care whether a graph passed validation. Callers
//! usually validate first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

use super::graph::{build_adjacency, root_ids, Adjacency};
use super::types::{Edge, Node, NodeType, WorkflowGraph};

/// A node placed in a tree, with its children nested under it
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
    #[serde(default)]
    pub level: usize,
}

/// Counts and complexity figures for a graph
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    /// Distinct node types used
    pub node_types: BTreeSet<String>,
    /// Distinct component ids referenced
    pub components: BTreeSet<String>,
    pub start_nodes: usize,
    pub end_nodes: usize,
    pub orphaned_nodes: usize,
    pub complexity: Complexity,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Complexity {
    /// Longest path (in edges) found by a visit-once DFS
    pub depth: usize,
    /// Mean out-degree over nodes that have outgoing edges
    pub branching: f64,
}

/// Drop empty `config` objects. Order and everything else are kept.
pub fn optimize_nodes(nodes: &[Node]) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            if node.data.config.as_ref().is_some_and(|c| c.is_empty()) {
                node.data.config = None;
            }
            node
        })
        .collect()
}

/// Drop empty handle fields. Order and everything else are kept.
pub fn optimize_edges(edges: &[Edge]) -> Vec<Edge> {
    edges
        .iter()
        .map(|edge| {
            let mut edge = edge.clone();
            if edge.source_handle.as_deref() == Some("") {
                edge.source_handle = None;
            }
            if edge.target_handle.as_deref() == Some("") {
                edge.target_handle = None;
            }
            edge
        })
        .collect()
}

/// Optimize both node and edge lists of a graph
pub fn optimize(graph: &WorkflowGraph) -> WorkflowGraph {
    WorkflowGraph::new(optimize_nodes(&graph.nodes), optimize_edges(&graph.edges))
}

/// Convert a graph into nested trees.
///
/// Every node without an incoming edge is a root. The visited set is shared
/// across all roots, so a node reachable along several paths is placed once,
/// under the first parent the DFS reaches it from. Nodes only reachable
/// through a cycle with no root are left out.
pub fn to_hierarchy(nodes: &[Node], edges: &[Edge]) -> Vec<HierarchyNode> {
    let adjacency = build_adjacency(nodes, edges);
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let roots = root_ids(nodes, edges);
    let mut visited: HashSet<&str> = HashSet::new();

    roots
        .iter()
        .filter_map(|id| place(id, &adjacency, &by_id, &mut visited))
        .collect()
}

/// A node being placed: its children are collected until every outgoing
/// edge has been followed
struct Placing<'a> {
    node: &'a Node,
    level: usize,
    next_child: usize,
    children: Vec<HierarchyNode>,
}

fn enter<'a>(
    id: &'a str,
    level: usize,
    by_id: &HashMap<&str, &'a Node>,
    visited: &mut HashSet<&'a str>,
) -> Option<Placing<'a>> {
    if !visited.insert(id) {
        return None;
    }
    by_id.get(id).copied().map(|node| Placing {
        node,
        level,
        next_child: 0,
        children: Vec::new(),
    })
}

fn place<'a>(
    root: &'a str,
    adjacency: &'a Adjacency,
    by_id: &HashMap<&str, &'a Node>,
    visited: &mut HashSet<&'a str>,
) -> Option<HierarchyNode> {
    let mut frames = vec![enter(root, 0, by_id, visited)?];

    while let Some(mut frame) = frames.pop() {
        let child = adjacency
            .get(frame.node.id.as_str())
            .and_then(|children| children.get(frame.next_child));

        if let Some(child) = child {
            frame.next_child += 1;
            let entered = enter(child.as_str(), frame.level + 1, by_id, visited);
            frames.push(frame);
            frames.extend(entered);
            continue;
        }

        let placed = HierarchyNode {
            node: frame.node.clone(),
            children: frame.children,
            level: frame.level,
        };
        match frames.last_mut() {
            Some(parent) => parent.children.push(placed),
            None => return Some(placed),
        }
    }

    None
}

/// Flatten trees back into a graph.
///
/// Nodes come out in depth-first pre-order. Each parent/child pair becomes
/// an edge `e-{parent}-{child}`; nodes with an empty id get a fresh UUID.
/// A graph with a node that had several parents does not survive
/// `to_hierarchy` followed by this: only the first parent edge is rebuilt.
pub fn from_hierarchy(hierarchy: &[HierarchyNode]) -> WorkflowGraph {
    let mut graph = WorkflowGraph::default();
    let mut pending: Vec<(&HierarchyNode, Option<String>)> =
        hierarchy.iter().rev().map(|entry| (entry, None)).collect();

    while let Some((entry, parent)) = pending.pop() {
        let mut node = entry.node.clone();
        if node.id.is_empty() {
            node.id = Uuid::new_v4().to_string();
        }
        let id = node.id.clone();

        if let Some(parent) = parent {
            let edge_id = format!("e-{}-{}", parent, id);
            graph.edges.push(Edge::new(edge_id, parent, id.as_str()));
        }
        graph.nodes.push(node);

        pending.extend(
            entry
                .children
                .iter()
                .rev()
                .map(|child| (child, Some(id.clone()))),
        );
    }

    graph
}

/// Compute counts and complexity for a graph
pub fn generate_metadata(nodes: &[Node], edges: &[Edge]) -> WorkflowMetadata {
    let adjacency = build_adjacency(nodes, edges);

    let connected: HashSet<&str> = edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    WorkflowMetadata {
        node_count: nodes.len(),
        edge_count: edges.len(),
        node_types: nodes.iter().map(|n| n.node_type.to_string()).collect(),
        components: nodes
            .iter()
            .filter_map(|n| n.data.component_id.clone())
            .collect(),
        start_nodes: nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Start)
            .count(),
        end_nodes: nodes
            .iter()
            .filter(|n| n.node_type == NodeType::End)
            .count(),
        orphaned_nodes: nodes
            .iter()
            .filter(|n| !connected.contains(n.id.as_str()))
            .count(),
        complexity: Complexity {
            depth: depth(nodes, edges, &adjacency),
            branching: branching(&adjacency),
        },
    }
}

fn depth(nodes: &[Node], edges: &[Edge], adjacency: &Adjacency) -> usize {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut max_depth = 0;

    // roots first, then whatever a root walk did not reach
    let roots = root_ids(nodes, edges);
    let starts = roots
        .iter()
        .map(String::as_str)
        .chain(nodes.iter().map(|n| n.id.as_str()));

    for id in starts {
        walk(id, adjacency, &mut visited, &mut max_depth);
    }
    max_depth
}

fn walk<'a>(
    root: &'a str,
    adjacency: &'a Adjacency,
    visited: &mut HashSet<&'a str>,
    max_depth: &mut usize,
) {
    if !visited.insert(root) {
        return;
    }
    // (node id, depth, index of the next child to follow)
    let mut frames: Vec<(&'a str, usize, usize)> = vec![(root, 0, 0)];

    while let Some(frame) = frames.last_mut() {
        let (id, depth, next_child) = *frame;
        *max_depth = (*max_depth).max(depth);

        match adjacency.get(id).and_then(|c| c.get(next_child)) {
            Some(child) => {
                frame.2 += 1;
                if visited.insert(child.as_str()) {
                    frames.push((child.as_str(), depth + 1, 0));
                }
            }
            None => {
                frames.pop();
            }
        }
    }
}

fn branching(adjacency: &Adjacency) -> f64 {
    let degrees: Vec<usize> = adjacency
        .values()
        .map(Vec::len)
        .filter(|d| *d > 0)
        .collect();

    if degrees.is_empty() {
        return 0.0;
    }
    degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn node(id: &str, node_type: NodeType) -> Node {
        Node::new(id, node_type)
    }

    fn pair_set(graph: &WorkflowGraph) -> BTreeSet<(String, String)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }

    fn long_chain(len: usize) -> (Vec<Node>, Vec<Edge>) {
        let nodes: Vec<Node> = (0..len)
            .map(|i| node(&format!("n{}", i), NodeType::Action))
            .collect();
        let edges = nodes
            .windows(2)
            .map(|w| {
                let id = format!("e-{}-{}", w[0].id, w[1].id);
                Edge::new(id, &w[0].id, &w[1].id)
            })
            .collect();
        (nodes, edges)
    }

    fn diamond() -> (Vec<Node>, Vec<Edge>) {
        (
            vec![
                node("s", NodeType::Start),
                node("a", NodeType::Action),
                node("b", NodeType::Action),
                node("e", NodeType::End),
            ],
            vec![
                Edge::new("e1", "s", "a"),
                Edge::new("e2", "s", "b"),
                Edge::new("e3", "a", "e"),
                Edge::new("e4", "b", "e"),
            ],
        )
    }

    #[test]
    fn test_optimize_nodes_strips_empty_config_only() {
        let nodes = vec![
            node("a", NodeType::Action).with_config(Map::new()),
            node("b", NodeType::Action).with_config(json!({"k": 1}).as_object().cloned().unwrap()),
            node("c", NodeType::End),
        ];
        let optimized = optimize_nodes(&nodes);

        assert_eq!(optimized.len(), 3);
        assert!(optimized[0].data.config.is_none());
        assert_eq!(optimized[1].data.config, nodes[1].data.config);
        assert_eq!(optimized[2], nodes[2]);
        assert_eq!(optimize_nodes(&optimized), optimized);
    }

    #[test]
    fn test_optimize_edges_strips_empty_handles() {
        let mut edge = Edge::new("e1", "a", "b");
        edge.source_handle = Some(String::new());
        edge.target_handle = Some("in".to_string());

        let optimized = optimize_edges(&[edge]);
        assert!(optimized[0].source_handle.is_none());
        assert_eq!(optimized[0].target_handle.as_deref(), Some("in"));
        assert_eq!(optimize_edges(&optimized), optimized);
    }

    #[test]
    fn test_to_hierarchy_tree() {
        let nodes = vec![
            node("root", NodeType::Start),
            node("left", NodeType::Action),
            node("right", NodeType::Action),
            node("leaf", NodeType::End),
        ];
        let edges = vec![
            Edge::new("e1", "root", "left"),
            Edge::new("e2", "root", "right"),
            Edge::new("e3", "left", "leaf"),
        ];
        let tree = to_hierarchy(&nodes, &edges);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].node.id, "root");
        assert_eq!(tree[0].level, 0);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].node.id, "left");
        assert_eq!(tree[0].children[0].children[0].node.id, "leaf");
        assert_eq!(tree[0].children[0].children[0].level, 2);
    }

    #[test]
    fn test_to_hierarchy_places_shared_node_once() {
        let (nodes, edges) = diamond();
        let tree = to_hierarchy(&nodes, &edges);

        let a = &tree[0].children[0];
        let b = &tree[0].children[1];
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].node.id, "e");
        assert!(b.children.is_empty());
    }

    #[test]
    fn test_hierarchy_round_trip_for_tree() {
        // listed in depth-first pre-order, the order from_hierarchy emits
        let nodes = vec![
            node("root", NodeType::Start),
            node("x", NodeType::Action),
            node("z", NodeType::End),
            node("y", NodeType::Data),
        ];
        let edges = vec![
            Edge::new("e-root-x", "root", "x"),
            Edge::new("e-x-z", "x", "z"),
            Edge::new("e-root-y", "root", "y"),
        ];
        let graph = from_hierarchy(&to_hierarchy(&nodes, &edges));

        assert_eq!(graph.nodes, nodes);
        assert_eq!(graph.edges, edges);
    }

    #[test]
    fn test_hierarchy_round_trip_is_lossy_for_dag() {
        let (nodes, edges) = diamond();
        let graph = from_hierarchy(&to_hierarchy(&nodes, &edges));

        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);
        let dropped = ("b".to_string(), "e".to_string());
        assert!(!pair_set(&graph).contains(&dropped));
    }

    #[test]
    fn test_from_hierarchy_assigns_missing_ids() {
        let hierarchy = vec![HierarchyNode {
            node: node("", NodeType::Start),
            children: vec![HierarchyNode {
                node: node("child", NodeType::End),
                children: vec![],
                level: 1,
            }],
            level: 0,
        }];
        let graph = from_hierarchy(&hierarchy);

        let root_id = &graph.nodes[0].id;
        assert!(Uuid::parse_str(root_id).is_ok());
        assert_eq!(graph.edges[0].source, *root_id);
        assert_eq!(graph.edges[0].target, "child");
    }

    #[test]
    fn test_hierarchy_node_serializes_flat() {
        let tree = to_hierarchy(&[node("solo", NodeType::Start)], &[]);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value[0]["id"], "solo");
        assert_eq!(value[0]["type"], "start");
        assert_eq!(value[0]["level"], 0);
        assert_eq!(value[0]["children"], json!([]));
    }

    #[test]
    fn test_metadata_chain() {
        let nodes = vec![
            node("start", NodeType::Start).with_component("trigger"),
            node("process", NodeType::Action).with_component("llm"),
            node("end", NodeType::End).with_component("llm"),
            node("lonely", NodeType::Data),
        ];
        let edges = vec![
            Edge::new("e1", "start", "process"),
            Edge::new("e2", "process", "end"),
        ];
        let meta = generate_metadata(&nodes, &edges);

        assert_eq!(meta.node_count, 4);
        assert_eq!(meta.edge_count, 2);
        assert_eq!(meta.start_nodes, 1);
        assert_eq!(meta.end_nodes, 1);
        assert_eq!(meta.orphaned_nodes, 1);
        assert_eq!(meta.components.len(), 2);
        assert!(meta.node_types.contains("data"));
        assert_eq!(meta.complexity.depth, 2);
        assert_eq!(meta.complexity.branching, 1.0);
    }

    #[test]
    fn test_metadata_depth_independent_of_node_order() {
        let nodes = vec![
            node("end", NodeType::End),
            node("process", NodeType::Action),
            node("start", NodeType::Start),
        ];
        let edges = vec![
            Edge::new("e1", "start", "process"),
            Edge::new("e2", "process", "end"),
        ];
        assert_eq!(generate_metadata(&nodes, &edges).complexity.depth, 2);
    }

    #[test]
    fn test_metadata_branching_is_mean_out_degree() {
        let (nodes, edges) = diamond();
        let meta = generate_metadata(&nodes, &edges);
        assert!((meta.complexity.branching - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(meta.complexity.depth, 2);
    }

    #[test]
    fn test_metadata_long_chain() {
        let (nodes, edges) = long_chain(100_000);
        let meta = generate_metadata(&nodes, &edges);

        assert_eq!(meta.complexity.depth, 99_999);
        assert_eq!(meta.complexity.branching, 1.0);
    }

    #[test]
    fn test_hierarchy_round_trip_long_chain() {
        let (nodes, edges) = long_chain(1_000);
        let tree = to_hierarchy(&nodes, &edges);
        assert_eq!(tree.len(), 1);

        let graph = from_hierarchy(&tree);
        assert_eq!(graph.nodes, nodes);
        assert_eq!(graph.edges, edges);
    }

    #[test]
    fn test_metadata_empty_graph() {
        let meta = generate_metadata(&[], &[]);
        assert_eq!(meta.node_count, 0);
        assert_eq!(meta.complexity.depth, 0);
        assert_eq!(meta.complexity.branching, 0.0);
    }
}
