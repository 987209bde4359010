//! Relationship graph: node/edge model, the arena-style adjacency graph,
//! the builder that produces it from flat records, and the snapshot store
//! that hands immutable graphs to concurrent readers.

mod builder;
mod snapshot;
mod stats;

pub use builder::{build_graph, BuildError, BuildOutcome, EdgeRecord, GraphRecords, NodeRecord};
pub use snapshot::{GraphSnapshot, GraphStore};
pub use stats::NetworkStats;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity kind. Closed set: a new kind is a new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Investor,
    Firm,
    Company,
    Sector,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Investor,
        NodeKind::Firm,
        NodeKind::Company,
        NodeKind::Sector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Investor => "investor",
            NodeKind::Firm => "firm",
            NodeKind::Company => "company",
            NodeKind::Sector => "sector",
        }
    }

    /// Case-insensitive parse of the store / query-string spelling.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        NodeKind::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type. Closed set: a new type is a new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DirectInvestment,
    CoInvestment,
    FirmColleague,
    BoardMember,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::DirectInvestment,
        EdgeType::CoInvestment,
        EdgeType::FirmColleague,
        EdgeType::BoardMember,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::DirectInvestment => "direct_investment",
            EdgeType::CoInvestment => "co_investment",
            EdgeType::FirmColleague => "firm_colleague",
            EdgeType::BoardMember => "board_member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        EdgeType::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An investor, firm, company, or sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Scoped per kind, e.g. `investor:42`.
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    /// 1 = most prominent.
    pub tier: u32,
    /// Data completeness in [0, 100].
    pub quality_score: f64,
    /// Incident edge count, recomputed on every build.
    pub degree: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

/// Undirected relationship, stored once and traversed both ways.
///
/// Inside a [`crate::paths::Path`] the copy is oriented along the traversal,
/// so `source`/`target` follow the path's node order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// In (0, 1]; higher is warmer.
    pub strength: f64,
}

impl Edge {
    /// Copy of this edge oriented so that `source == from`.
    pub fn oriented_from(&self, from: &str) -> Edge {
        if self.source == from {
            self.clone()
        } else {
            Edge {
                source: self.target.clone(),
                target: self.source.clone(),
                edge_type: self.edge_type,
                strength: self.strength,
            }
        }
    }
}

/// One adjacency entry: the neighbor's index and the connecting edge's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacent {
    pub neighbor: usize,
    pub edge: usize,
}

/// Arena graph: nodes and edges addressed by dense indices, adjacency lists
/// per node. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    endpoints: Vec<(usize, usize)>,
    adjacency: Vec<Vec<Adjacent>>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// Node indices of an edge's two endpoints.
    pub fn endpoints(&self, edge_idx: usize) -> (usize, usize) {
        self.endpoints[edge_idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Adjacency of a node, ordered by neighbor index then strongest edge first.
    pub fn neighbors(&self, idx: usize) -> &[Adjacent] {
        &self.adjacency[idx]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_case_insensitive() {
        assert_eq!(NodeKind::parse(" Investor "), Some(NodeKind::Investor));
        assert_eq!(NodeKind::parse("SECTOR"), Some(NodeKind::Sector));
        assert_eq!(NodeKind::parse("person"), None);
    }

    #[test]
    fn test_edge_type_roundtrips_through_serde_names() {
        for t in EdgeType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(EdgeType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_edge_oriented_from_swaps_endpoints() {
        let e = Edge {
            source: "A".to_string(),
            target: "B".to_string(),
            edge_type: EdgeType::BoardMember,
            strength: 0.5,
        };
        let flipped = e.oriented_from("B");
        assert_eq!(flipped.source, "B");
        assert_eq!(flipped.target, "A");
        assert_eq!(e.oriented_from("A"), e);
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let graph = test_support::abc_graph();
        let value = serde_json::to_value(graph.get("A").unwrap()).unwrap();
        assert!(value.get("qualityScore").is_some());
        assert_eq!(value["kind"], "investor");
        assert_eq!(value["degree"], 1);
        assert!(value.get("sector").is_none());
    }
}
