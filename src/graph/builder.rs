//! Graph construction from flat entity/relationship records.
//!
//! Malformed records are skipped and reported; one bad row never blocks the
//! rest of the dataset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Adjacent, Edge, EdgeType, Graph, Node, NodeKind};

/// Raw entity row, string-typed as it comes out of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub tier: i64,
    pub quality_score: f64,
    pub sector: Option<String>,
}

/// Raw relationship row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub strength: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRecords {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// A record rejected during construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("node '{id}' has unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("node '{id}' has invalid tier {tier}")]
    InvalidTier { id: String, tier: i64 },

    #[error("duplicate node id '{id}'")]
    DuplicateNode { id: String },

    #[error("edge {from} -> {to} references missing node '{missing}'")]
    MissingEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("self-loop on '{id}'")]
    SelfLoop { id: String },

    #[error("edge {from} -> {to} has unknown type '{edge_type}'")]
    UnknownEdgeType {
        from: String,
        to: String,
        edge_type: String,
    },

    #[error("edge {from} -> {to} has strength {strength} outside (0, 1]")]
    InvalidStrength {
        from: String,
        to: String,
        strength: f64,
    },

    #[error("duplicate {edge_type} edge {from} -> {to} merged")]
    DuplicateEdge {
        from: String,
        to: String,
        edge_type: EdgeType,
    },
}

/// A built graph plus every record that was skipped or merged on the way.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: Graph,
    pub warnings: Vec<BuildError>,
}

const LOGGED_WARNINGS: usize = 20;

/// Build an arena graph from raw records.
///
/// Duplicate edges (same unordered pair, same type) collapse into one, keeping
/// the larger strength. Degrees are counted over the surviving edges.
pub fn build_graph(records: &GraphRecords) -> BuildOutcome {
    let mut warnings = Vec::new();
    let mut graph = Graph::empty();

    for rec in &records.nodes {
        let Some(kind) = NodeKind::parse(&rec.kind) else {
            warnings.push(BuildError::UnknownKind {
                id: rec.id.clone(),
                kind: rec.kind.clone(),
            });
            continue;
        };
        if rec.tier < 1 || rec.tier > u32::MAX as i64 {
            warnings.push(BuildError::InvalidTier {
                id: rec.id.clone(),
                tier: rec.tier,
            });
            continue;
        }
        if graph.index.contains_key(&rec.id) {
            warnings.push(BuildError::DuplicateNode { id: rec.id.clone() });
            continue;
        }
        let quality_score = if rec.quality_score.is_finite() {
            rec.quality_score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        graph.index.insert(rec.id.clone(), graph.nodes.len());
        graph.nodes.push(Node {
            id: rec.id.clone(),
            kind,
            name: rec.name.clone(),
            tier: rec.tier as u32,
            quality_score,
            degree: 0,
            sector: rec.sector.clone().filter(|s| !s.trim().is_empty()),
        });
    }

    // (low index, high index, type) -> edge index, for duplicate merging
    let mut seen: HashMap<(usize, usize, EdgeType), usize> = HashMap::new();

    for rec in &records.edges {
        if rec.source == rec.target {
            warnings.push(BuildError::SelfLoop {
                id: rec.source.clone(),
            });
            continue;
        }
        let (Some(src), Some(dst)) = (graph.index_of(&rec.source), graph.index_of(&rec.target)) else {
            let missing = if graph.contains(&rec.source) {
                rec.target.clone()
            } else {
                rec.source.clone()
            };
            warnings.push(BuildError::MissingEndpoint {
                from: rec.source.clone(),
                to: rec.target.clone(),
                missing,
            });
            continue;
        };
        let Some(edge_type) = EdgeType::parse(&rec.edge_type) else {
            warnings.push(BuildError::UnknownEdgeType {
                from: rec.source.clone(),
                to: rec.target.clone(),
                edge_type: rec.edge_type.clone(),
            });
            continue;
        };
        if !(rec.strength > 0.0 && rec.strength <= 1.0) {
            warnings.push(BuildError::InvalidStrength {
                from: rec.source.clone(),
                to: rec.target.clone(),
                strength: rec.strength,
            });
            continue;
        }

        let key = (src.min(dst), src.max(dst), edge_type);
        if let Some(&existing) = seen.get(&key) {
            let kept = &mut graph.edges[existing];
            kept.strength = kept.strength.max(rec.strength);
            warnings.push(BuildError::DuplicateEdge {
                from: rec.source.clone(),
                to: rec.target.clone(),
                edge_type,
            });
            continue;
        }

        seen.insert(key, graph.edges.len());
        graph.endpoints.push((src, dst));
        graph.edges.push(Edge {
            source: rec.source.clone(),
            target: rec.target.clone(),
            edge_type,
            strength: rec.strength,
        });
    }

    graph.adjacency = vec![Vec::new(); graph.nodes.len()];
    for (edge_idx, &(a, b)) in graph.endpoints.iter().enumerate() {
        graph.adjacency[a].push(Adjacent { neighbor: b, edge: edge_idx });
        graph.adjacency[b].push(Adjacent { neighbor: a, edge: edge_idx });
    }
    for (idx, adj) in graph.adjacency.iter_mut().enumerate() {
        let edges = &graph.edges;
        adj.sort_by(|x, y| {
            x.neighbor
                .cmp(&y.neighbor)
                .then_with(|| edges[y.edge].strength.total_cmp(&edges[x.edge].strength))
                .then_with(|| edges[x.edge].edge_type.cmp(&edges[y.edge].edge_type))
        });
        graph.nodes[idx].degree = adj.len();
    }

    for warning in warnings.iter().take(LOGGED_WARNINGS) {
        log::warn!("Skipping record: {}", warning);
    }
    if warnings.len() > LOGGED_WARNINGS {
        log::warn!(
            "{} more malformed records skipped (not logged individually)",
            warnings.len() - LOGGED_WARNINGS
        );
    }
    log::debug!(
        "Graph built: {} nodes, {} edges, {} warnings",
        graph.node_count(),
        graph.edge_count(),
        warnings.len()
    );

    BuildOutcome { graph, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{edge, node};

    #[test]
    fn test_build_basic_degrees() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 2), node("C", "firm", 1)],
            edges: vec![
                edge("A", "B", "co_investment", 0.9),
                edge("B", "C", "firm_colleague", 0.7),
            ],
        };
        let out = build_graph(&records);
        assert!(out.warnings.is_empty());
        assert_eq!(out.graph.node_count(), 3);
        assert_eq!(out.graph.edge_count(), 2);
        assert_eq!(out.graph.get("A").unwrap().degree, 1);
        assert_eq!(out.graph.get("B").unwrap().degree, 2);
        assert_eq!(out.graph.get("C").unwrap().kind, NodeKind::Firm);
    }

    #[test]
    fn test_missing_endpoint_skipped_rest_kept() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 1)],
            edges: vec![
                edge("A", "B", "co_investment", 0.5),
                edge("A", "ghost", "co_investment", 0.5),
            ],
        };
        let out = build_graph(&records);
        assert_eq!(out.graph.node_count(), 2);
        assert_eq!(out.graph.edge_count(), 1);
        assert_eq!(
            out.warnings,
            vec![BuildError::MissingEndpoint {
                from: "A".to_string(),
                to: "ghost".to_string(),
                missing: "ghost".to_string(),
            }]
        );
        assert_eq!(out.graph.get("A").unwrap().degree, 1);
    }

    #[test]
    fn test_self_loop_and_bad_strength_rejected() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 1)],
            edges: vec![
                edge("A", "A", "co_investment", 0.5),
                edge("A", "B", "co_investment", 0.0),
                edge("A", "B", "board_member", -0.3),
                edge("A", "B", "firm_colleague", 1.5),
                edge("A", "B", "direct_investment", f64::NAN),
            ],
        };
        let out = build_graph(&records);
        assert_eq!(out.graph.edge_count(), 0);
        assert_eq!(out.warnings.len(), 5);
        assert!(matches!(out.warnings[0], BuildError::SelfLoop { .. }));
        assert!(out.warnings[1..]
            .iter()
            .all(|w| matches!(w, BuildError::InvalidStrength { .. })));
        assert_eq!(out.graph.get("A").unwrap().degree, 0);
    }

    #[test]
    fn test_unknown_kind_and_type_are_warnings() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("P", "person", 1), node("B", "investor", 1)],
            edges: vec![edge("A", "B", "friendship", 0.5)],
        };
        let out = build_graph(&records);
        assert_eq!(out.graph.node_count(), 2);
        assert_eq!(out.graph.edge_count(), 0);
        assert!(matches!(out.warnings[0], BuildError::UnknownKind { .. }));
        assert!(matches!(out.warnings[1], BuildError::UnknownEdgeType { .. }));
    }

    #[test]
    fn test_duplicate_node_first_wins() {
        let mut second = node("A", "firm", 3);
        second.name = "Second".to_string();
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), second],
            edges: vec![],
        };
        let out = build_graph(&records);
        assert_eq!(out.graph.node_count(), 1);
        assert_eq!(out.graph.get("A").unwrap().kind, NodeKind::Investor);
        assert_eq!(out.warnings, vec![BuildError::DuplicateNode { id: "A".to_string() }]);
    }

    #[test]
    fn test_invalid_tier_skips_node() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 0)],
            edges: vec![],
        };
        let out = build_graph(&records);
        assert!(out.graph.is_empty());
        assert!(matches!(out.warnings[0], BuildError::InvalidTier { tier: 0, .. }));
    }

    #[test]
    fn test_duplicate_edge_merged_keeps_stronger() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 1)],
            edges: vec![
                edge("A", "B", "co_investment", 0.4),
                edge("B", "A", "co_investment", 0.8),
                edge("A", "B", "board_member", 0.2),
            ],
        };
        let out = build_graph(&records);
        assert_eq!(out.graph.edge_count(), 2);
        assert_eq!(out.graph.edges()[0].strength, 0.8);
        assert_eq!(out.graph.get("A").unwrap().degree, 2);
        assert_eq!(out.warnings.len(), 1);
        // strongest edge to the same neighbor comes first
        let a = out.graph.index_of("A").unwrap();
        let first = out.graph.neighbors(a)[0];
        assert_eq!(out.graph.edge(first.edge).edge_type, EdgeType::CoInvestment);
    }

    #[test]
    fn test_quality_score_clamped() {
        let mut rec = node("A", "investor", 1);
        rec.quality_score = 140.0;
        let mut nan = node("B", "investor", 1);
        nan.quality_score = f64::NAN;
        let out = build_graph(&GraphRecords {
            nodes: vec![rec, nan],
            edges: vec![],
        });
        assert_eq!(out.graph.get("A").unwrap().quality_score, 100.0);
        assert_eq!(out.graph.get("B").unwrap().quality_score, 0.0);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let records = GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 2)],
            edges: vec![edge("A", "B", "co_investment", 0.9)],
        };
        let first = build_graph(&records).graph;
        let second = build_graph(&records).graph;
        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.edges(), second.edges());
    }
}
