//! Filter- and budget-driven reduction of the full graph into a
//! visualization-ready node/edge set.
//!
//! Nodes passing the filters are ranked by (tier ascending, degree
//! descending, quality descending, id ascending) and the top `node_budget`
//! are kept, with the focus node always first. Edges survive only when both
//! endpoints do.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::deadline::Deadline;
use crate::error::{Result, WarmgraphError};
use crate::graph::{Edge, EdgeType, Graph, Node, NodeKind};

const DEADLINE_POLL: usize = 4096;

/// Recognized filter options. Unknown keys are ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubgraphFilters {
    pub kinds: Option<BTreeSet<NodeKind>>,
    pub min_tier: Option<u32>,
    pub max_tier: Option<u32>,
    pub min_degree: Option<usize>,
    /// Matched case-insensitively against a node's sector, or a sector node's name/id.
    pub sectors: Option<BTreeSet<String>>,
    /// Restricts which edges are emitted; node selection is unaffected.
    pub connection_types: Option<BTreeSet<EdgeType>>,
    pub focus_id: Option<String>,
}

impl SubgraphFilters {
    fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_tier, self.max_tier) {
            if min > max {
                return Err(WarmgraphError::InvalidRequest(format!(
                    "min_tier ({}) is greater than max_tier ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }

    fn sector_keys(&self) -> Option<BTreeSet<String>> {
        self.sectors
            .as_ref()
            .map(|set| set.iter().map(|s| s.trim().to_lowercase()).collect())
    }

    fn matches(&self, node: &Node, sectors: Option<&BTreeSet<String>>) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&node.kind) {
                return false;
            }
        }
        if self.min_tier.is_some_and(|min| node.tier < min) {
            return false;
        }
        if self.max_tier.is_some_and(|max| node.tier > max) {
            return false;
        }
        if self.min_degree.is_some_and(|min| node.degree < min) {
            return false;
        }
        if let Some(sectors) = sectors {
            let own = node
                .sector
                .as_deref()
                .is_some_and(|s| sectors.contains(&s.trim().to_lowercase()));
            let is_named_sector = node.kind == NodeKind::Sector
                && (sectors.contains(&node.name.to_lowercase())
                    || sectors.contains(&node.id.to_lowercase()));
            if !own && !is_named_sector {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphStats {
    /// Nodes in the snapshot the subgraph was cut from.
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Nodes passing the filters before the budget was applied.
    pub matched_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_node: Option<Node>,
}

/// A bounded, referentially closed view of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_id: Option<String>,
    pub stats: SubgraphStats,
}

fn selection_order(a: &Node, b: &Node) -> Ordering {
    a.tier
        .cmp(&b.tier)
        .then_with(|| b.degree.cmp(&a.degree))
        .then_with(|| b.quality_score.total_cmp(&a.quality_score))
        .then_with(|| a.id.cmp(&b.id))
}

/// Cut a subgraph of at most `node_budget` nodes out of `graph`.
///
/// An empty result is valid. The focus node is kept regardless of filters or
/// score; an unknown focus id is an invalid request.
pub fn extract(
    graph: &Graph,
    filters: &SubgraphFilters,
    node_budget: usize,
    deadline: Deadline,
) -> Result<Subgraph> {
    if node_budget == 0 {
        return Err(WarmgraphError::InvalidRequest(
            "node budget must be at least 1".to_string(),
        ));
    }
    filters.validate()?;

    let focus = match &filters.focus_id {
        Some(id) => Some(graph.index_of(id).ok_or_else(|| {
            WarmgraphError::InvalidRequest(format!("focus node '{}' is not in the graph", id))
        })?),
        None => None,
    };

    let sectors = filters.sector_keys();
    let mut candidates = Vec::new();
    for (idx, node) in graph.nodes().iter().enumerate() {
        if idx % DEADLINE_POLL == 0 {
            deadline.check("subgraph extraction")?;
        }
        if Some(idx) != focus && filters.matches(node, sectors.as_ref()) {
            candidates.push(idx);
        }
    }
    let matched_nodes = candidates.len() + usize::from(focus.is_some_and(|f| filters.matches(graph.node(f), sectors.as_ref())));

    let slots = node_budget - usize::from(focus.is_some());
    if candidates.len() > slots {
        candidates.select_nth_unstable_by(slots, |&a, &b| {
            selection_order(graph.node(a), graph.node(b))
        });
        candidates.truncate(slots);
    }
    candidates.sort_by(|&a, &b| selection_order(graph.node(a), graph.node(b)));

    let selected: Vec<usize> = focus.into_iter().chain(candidates).collect();
    let mut keep = vec![false; graph.node_count()];
    for &idx in &selected {
        keep[idx] = true;
    }

    deadline.check("subgraph extraction")?;

    let mut edges = Vec::new();
    for edge_idx in 0..graph.edge_count() {
        if edge_idx % DEADLINE_POLL == 0 {
            deadline.check("subgraph extraction")?;
        }
        let (a, b) = graph.endpoints(edge_idx);
        if !(keep[a] && keep[b]) {
            continue;
        }
        let edge = graph.edge(edge_idx);
        if let Some(types) = &filters.connection_types {
            if !types.contains(&edge.edge_type) {
                continue;
            }
        }
        edges.push(edge.clone());
    }

    let nodes: Vec<Node> = selected.iter().map(|&i| graph.node(i).clone()).collect();
    log::debug!(
        "Extracted subgraph: {} of {} matching nodes, {} edges",
        nodes.len(),
        matched_nodes,
        edges.len()
    );

    Ok(Subgraph {
        stats: SubgraphStats {
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            matched_nodes,
            focus_node: focus.map(|f| graph.node(f).clone()),
        },
        focus_id: filters.focus_id.clone(),
        nodes,
        edges,
    })
}
