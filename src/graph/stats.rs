//! Aggregate counts over a built graph.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{EdgeType, Graph, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    /// tier -> node count
    pub tier_distribution: BTreeMap<u32, usize>,
    pub isolated_nodes: usize,
    pub max_degree: usize,
}

impl NetworkStats {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut nodes_by_kind: BTreeMap<NodeKind, usize> =
            NodeKind::ALL.iter().map(|k| (*k, 0)).collect();
        let mut edges_by_type: BTreeMap<EdgeType, usize> =
            EdgeType::ALL.iter().map(|t| (*t, 0)).collect();
        let mut tier_distribution = BTreeMap::new();
        let mut isolated_nodes = 0;
        let mut max_degree = 0;

        for node in graph.nodes() {
            *nodes_by_kind.entry(node.kind).or_insert(0) += 1;
            *tier_distribution.entry(node.tier).or_insert(0) += 1;
            if node.degree == 0 {
                isolated_nodes += 1;
            }
            max_degree = max_degree.max(node.degree);
        }
        for edge in graph.edges() {
            *edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
        }

        Self {
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            nodes_by_kind,
            edges_by_type,
            tier_distribution,
            isolated_nodes,
            max_degree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{abc_graph, edge, node};
    use crate::graph::{build_graph, GraphRecords};

    #[test]
    fn test_stats_counts() {
        let stats = NetworkStats::from_graph(&abc_graph());
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.nodes_by_kind[&NodeKind::Investor], 3);
        assert_eq!(stats.nodes_by_kind[&NodeKind::Firm], 0);
        assert_eq!(stats.edges_by_type[&EdgeType::CoInvestment], 1);
        assert_eq!(stats.tier_distribution.get(&2), Some(&1));
        assert_eq!(stats.isolated_nodes, 0);
        assert_eq!(stats.max_degree, 2);
    }

    #[test]
    fn test_stats_isolated_and_serialization() {
        let graph = build_graph(&GraphRecords {
            nodes: vec![node("A", "firm", 1), node("B", "sector", 4)],
            edges: vec![edge("A", "B", "board_member", 1.0)],
        })
        .graph;
        let stats = NetworkStats::from_graph(&graph);
        assert_eq!(stats.isolated_nodes, 0);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["nodesByKind"]["sector"], 1);
        assert_eq!(json["tierDistribution"]["4"], 1);
        assert_eq!(json["totalEdges"], 1);

        let empty = NetworkStats::from_graph(&Graph::empty());
        assert_eq!(empty.total_nodes, 0);
        assert_eq!(empty.max_degree, 0);
    }
}
