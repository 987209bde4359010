//! Warm-introduction path finding: bounded BFS between two nodes and a
//! deterministic ranking of every path found.

mod finder;
mod ranking;

pub use finder::find_paths;
pub use ranking::{aggregate_strength, rank_order};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::graph::{Edge, EdgeType, Node, NodeKind};

pub const DEFAULT_MAX_HOPS: usize = 3;
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_MAX_VISITED: usize = 200_000;

/// A traversal from source to target. Built fresh per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    /// `hops + 1` nodes, source first.
    pub nodes: Vec<Node>,
    /// `edges[i]` joins `nodes[i]` and `nodes[i + 1]`, oriented along the path.
    pub edges: Vec<Edge>,
    pub hops: usize,
    /// Product of edge strengths.
    pub aggregate_strength: f64,
}

impl Path {
    pub(crate) fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let aggregate_strength = aggregate_strength(&edges);
        Self {
            hops: edges.len(),
            nodes,
            edges,
            aggregate_strength,
        }
    }

    /// Nodes strictly between source and target.
    pub fn intermediates(&self) -> &[Node] {
        if self.nodes.len() <= 2 {
            &[]
        } else {
            &self.nodes[1..self.nodes.len() - 1]
        }
    }

    /// Mean tier of the intermediate nodes; 0.0 for a direct path.
    pub fn average_intermediate_tier(&self) -> f64 {
        let mids = self.intermediates();
        if mids.is_empty() {
            return 0.0;
        }
        mids.iter().map(|n| n.tier as f64).sum::<f64>() / mids.len() as f64
    }

    pub fn is_direct(&self) -> bool {
        self.hops == 1
    }

    pub fn first_edge_type(&self) -> Option<EdgeType> {
        self.edges.first().map(|e| e.edge_type)
    }
}

/// Knobs for one path search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOptions {
    pub max_hops: usize,
    pub max_results: usize,
    /// Kinds allowed strictly between source and target.
    pub intermediate_kinds: BTreeSet<NodeKind>,
    /// Restrict traversal to these relationship types; `None` allows all.
    pub connection_types: Option<BTreeSet<EdgeType>>,
    /// Hard cap on explored states, independent of the deadline.
    pub max_visited: usize,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            max_results: DEFAULT_MAX_RESULTS,
            intermediate_kinds: BTreeSet::from([NodeKind::Investor]),
            connection_types: None,
            max_visited: DEFAULT_MAX_VISITED,
        }
    }
}

impl PathOptions {
    /// Also route through firm and company nodes.
    pub fn with_firm_intermediaries(mut self) -> Self {
        self.intermediate_kinds.insert(NodeKind::Firm);
        self.intermediate_kinds.insert(NodeKind::Company);
        self
    }
}

/// Ranked search outcome: the canonical best path plus all alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSearch {
    pub best_path: Option<Path>,
    /// Every returned path in rank order, best first.
    pub paths: Vec<Path>,
}

impl PathSearch {
    pub fn from_ranked(paths: Vec<Path>) -> Self {
        Self {
            best_path: paths.first().cloned(),
            paths,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
