//! Bounded breadth-first path enumeration.

use std::collections::VecDeque;

use super::{rank_order, Path, PathOptions};
use crate::deadline::Deadline;
use crate::error::{NodeRole, Result, WarmgraphError};
use crate::graph::Graph;

/// One partial path in the search arena: reached `node` over `edge` from `parent`.
struct State {
    node: usize,
    edge: usize,
    parent: Option<usize>,
    depth: usize,
}

/// How often (in expanded states) the deadline is polled.
const DEADLINE_POLL: usize = 1024;

/// Find and rank simple paths from `source_id` to `target_id` of at most
/// `opts.max_hops` edges.
///
/// Intermediate nodes must be of a kind in `opts.intermediate_kinds`. Between
/// any two consecutive nodes only the strongest permitted edge is used. No
/// path is a normal outcome and yields an empty list.
pub fn find_paths(
    graph: &Graph,
    source_id: &str,
    target_id: &str,
    opts: &PathOptions,
    deadline: Deadline,
) -> Result<Vec<Path>> {
    if source_id == target_id {
        return Err(WarmgraphError::InvalidRequest(
            "source and target must be different nodes".to_string(),
        ));
    }
    if opts.max_hops == 0 {
        return Err(WarmgraphError::InvalidRequest(
            "max_hops must be at least 1".to_string(),
        ));
    }
    if opts.max_results == 0 {
        return Err(WarmgraphError::InvalidRequest(
            "max_results must be at least 1".to_string(),
        ));
    }
    let source = graph
        .index_of(source_id)
        .ok_or_else(|| WarmgraphError::NodeNotFound {
            id: source_id.to_string(),
            role: NodeRole::Source,
        })?;
    let target = graph
        .index_of(target_id)
        .ok_or_else(|| WarmgraphError::NodeNotFound {
            id: target_id.to_string(),
            role: NodeRole::Target,
        })?;

    let started = std::time::Instant::now();
    let mut arena: Vec<State> = Vec::new();
    let mut queue: VecDeque<Option<usize>> = VecDeque::new();
    // (parent state, final edge) per complete path
    let mut found: Vec<(Option<usize>, usize)> = Vec::new();
    let mut truncated = false;
    let mut expanded = 0usize;

    // `None` stands for the root (source, depth 0).
    queue.push_back(None);

    'search: while let Some(current) = queue.pop_front() {
        expanded += 1;
        if expanded % DEADLINE_POLL == 0 {
            deadline.check("path search")?;
        }

        let (node, depth) = match current {
            Some(idx) => (arena[idx].node, arena[idx].depth),
            None => (source, 0),
        };

        let mut last_neighbor = None;
        for adj in graph.neighbors(node) {
            if last_neighbor == Some(adj.neighbor) {
                continue;
            }
            let edge = graph.edge(adj.edge);
            if let Some(types) = &opts.connection_types {
                if !types.contains(&edge.edge_type) {
                    continue;
                }
            }
            last_neighbor = Some(adj.neighbor);

            if arena.len() + found.len() >= opts.max_visited {
                truncated = true;
                break 'search;
            }

            if adj.neighbor == target {
                found.push((current, adj.edge));
                continue;
            }
            if depth + 1 >= opts.max_hops {
                continue;
            }
            let kind = graph.node(adj.neighbor).kind;
            if !opts.intermediate_kinds.contains(&kind) {
                continue;
            }
            if adj.neighbor == source || on_path(&arena, current, adj.neighbor) {
                continue;
            }
            arena.push(State {
                node: adj.neighbor,
                edge: adj.edge,
                parent: current,
                depth: depth + 1,
            });
            queue.push_back(Some(arena.len() - 1));
        }
    }

    deadline.check("path search")?;

    if truncated {
        log::warn!(
            "Path search {} -> {} hit the visited-state cap ({}); ranking partial candidates",
            source_id,
            target_id,
            opts.max_visited
        );
    }

    let mut paths: Vec<Path> = found
        .into_iter()
        .map(|(parent, last_edge)| materialize(graph, &arena, source, parent, last_edge))
        .collect();
    paths.sort_by(rank_order);
    paths.truncate(opts.max_results);

    log::debug!(
        "Path search {} -> {}: {} states, {} paths returned in {:?}",
        source_id,
        target_id,
        arena.len(),
        paths.len(),
        started.elapsed()
    );
    Ok(paths)
}

fn on_path(arena: &[State], mut state: Option<usize>, node: usize) -> bool {
    while let Some(idx) = state {
        if arena[idx].node == node {
            return true;
        }
        state = arena[idx].parent;
    }
    false
}

fn materialize(
    graph: &Graph,
    arena: &[State],
    source: usize,
    parent: Option<usize>,
    last_edge: usize,
) -> Path {
    let mut node_idx = Vec::new();
    let mut edge_idx = vec![last_edge];
    let mut state = parent;
    while let Some(idx) = state {
        node_idx.push(arena[idx].node);
        edge_idx.push(arena[idx].edge);
        state = arena[idx].parent;
    }
    node_idx.push(source);
    node_idx.reverse();
    edge_idx.reverse();

    let (a, b) = graph.endpoints(last_edge);
    let target = if node_idx.last() == Some(&a) { b } else { a };
    node_idx.push(target);

    let nodes: Vec<_> = node_idx.iter().map(|&i| graph.node(i).clone()).collect();
    let edges = edge_idx
        .iter()
        .zip(&nodes)
        .map(|(&e, from)| graph.edge(e).oriented_from(&from.id))
        .collect();
    Path::new(nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{abc_graph, edge, node};
    use crate::graph::{build_graph, EdgeType, GraphRecords, NodeKind};
    use std::collections::BTreeSet;
    use std::time::Instant;

    fn search(graph: &Graph, s: &str, t: &str, opts: &PathOptions) -> Result<Vec<Path>> {
        find_paths(graph, s, t, opts, Deadline::none())
    }

    fn ids(path: &Path) -> Vec<&str> {
        path.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_scenario_two_hop_path() {
        let graph = abc_graph();
        let paths = search(&graph, "A", "C", &PathOptions::default()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec!["A", "B", "C"]);
        assert_eq!(paths[0].hops, 2);
        assert_eq!(paths[0].edges[0].edge_type, EdgeType::CoInvestment);
        assert_eq!(paths[0].edges[1].source, "B");
        assert_eq!(paths[0].edges[1].target, "C");
    }

    #[test]
    fn test_scenario_max_hops_one_is_empty() {
        let graph = abc_graph();
        let opts = PathOptions {
            max_hops: 1,
            ..PathOptions::default()
        };
        assert!(search(&graph, "A", "C", &opts).unwrap().is_empty());
    }

    #[test]
    fn test_same_source_target_invalid() {
        let graph = abc_graph();
        let err = search(&graph, "A", "A", &PathOptions::default()).unwrap_err();
        assert!(matches!(err, WarmgraphError::InvalidRequest(_)));
        // checked before existence
        let err = search(&graph, "nope", "nope", &PathOptions::default()).unwrap_err();
        assert!(matches!(err, WarmgraphError::InvalidRequest(_)));
    }

    #[test]
    fn test_missing_ids_name_role() {
        let graph = abc_graph();
        let err = search(&graph, "X", "C", &PathOptions::default()).unwrap_err();
        assert!(matches!(err, WarmgraphError::NodeNotFound { role: NodeRole::Source, .. }));
        let err = search(&graph, "A", "Y", &PathOptions::default()).unwrap_err();
        match err {
            WarmgraphError::NodeNotFound { id, role } => {
                assert_eq!(id, "Y");
                assert_eq!(role, NodeRole::Target);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_limits_invalid() {
        let graph = abc_graph();
        let opts = PathOptions {
            max_hops: 0,
            ..PathOptions::default()
        };
        assert!(matches!(
            search(&graph, "A", "C", &opts),
            Err(WarmgraphError::InvalidRequest(_))
        ));
        let opts = PathOptions {
            max_results: 0,
            ..PathOptions::default()
        };
        assert!(matches!(
            search(&graph, "A", "C", &opts),
            Err(WarmgraphError::InvalidRequest(_))
        ));
    }

    fn firm_bridge_graph() -> Graph {
        build_graph(&GraphRecords {
            nodes: vec![
                node("A", "investor", 1),
                node("F", "firm", 1),
                node("C", "investor", 1),
            ],
            edges: vec![
                edge("A", "F", "firm_colleague", 0.8),
                edge("F", "C", "firm_colleague", 0.8),
            ],
        })
        .graph
    }

    #[test]
    fn test_investor_only_intermediates_by_default() {
        let graph = firm_bridge_graph();
        assert!(search(&graph, "A", "C", &PathOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_firm_intermediaries_when_allowed() {
        let graph = firm_bridge_graph();
        let opts = PathOptions::default().with_firm_intermediaries();
        let paths = search(&graph, "A", "C", &opts).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec!["A", "F", "C"]);
        assert_eq!(paths[0].intermediates()[0].kind, NodeKind::Firm);
    }

    #[test]
    fn test_endpoints_may_be_any_kind() {
        let graph = firm_bridge_graph();
        let paths = search(&graph, "A", "F", &PathOptions::default()).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_direct());
    }

    fn diamond() -> Graph {
        // A-B-D, A-C-D, A-D direct weak, B-C link
        build_graph(&GraphRecords {
            nodes: vec![
                node("A", "investor", 1),
                node("B", "investor", 2),
                node("C", "investor", 1),
                node("D", "investor", 1),
            ],
            edges: vec![
                edge("A", "B", "co_investment", 0.9),
                edge("B", "D", "co_investment", 0.9),
                edge("A", "C", "firm_colleague", 0.9),
                edge("C", "D", "board_member", 0.9),
                edge("A", "D", "direct_investment", 0.3),
                edge("B", "C", "co_investment", 0.5),
            ],
        })
        .graph
    }

    #[test]
    fn test_ranking_and_tie_breaks_on_diamond() {
        let graph = diamond();
        let opts = PathOptions {
            max_results: 10,
            ..PathOptions::default()
        };
        let paths = search(&graph, "A", "D", &opts).unwrap();
        let order: Vec<Vec<&str>> = paths.iter().map(ids).collect();
        // 0.81 via C (tier 1) beats 0.81 via B (tier 2); then 3-hop 0.405s; then direct 0.3
        assert_eq!(
            order,
            vec![
                vec!["A", "C", "D"],
                vec!["A", "B", "D"],
                vec!["A", "B", "C", "D"],
                vec!["A", "C", "B", "D"],
                vec!["A", "D"],
            ]
        );
        for pair in paths.windows(2) {
            assert_ne!(rank_order(&pair[0], &pair[1]), std::cmp::Ordering::Greater);
        }
    }

    #[test]
    fn test_max_results_truncates_after_ranking() {
        let graph = diamond();
        let opts = PathOptions {
            max_results: 2,
            ..PathOptions::default()
        };
        let paths = search(&graph, "A", "D", &opts).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(ids(&paths[0]), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_connection_type_restriction() {
        let graph = diamond();
        let opts = PathOptions {
            connection_types: Some(BTreeSet::from([EdgeType::CoInvestment])),
            ..PathOptions::default()
        };
        let paths = search(&graph, "A", "D", &opts).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_parallel_edges_use_strongest() {
        let graph = build_graph(&GraphRecords {
            nodes: vec![node("A", "investor", 1), node("B", "investor", 1)],
            edges: vec![
                edge("A", "B", "co_investment", 0.4),
                edge("A", "B", "board_member", 0.6),
            ],
        })
        .graph;
        let paths = search(&graph, "A", "B", &PathOptions::default()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges[0].edge_type, EdgeType::BoardMember);
        assert_eq!(paths[0].aggregate_strength, 0.6);
    }

    #[test]
    fn test_cycle_terminates_with_simple_paths() {
        let graph = build_graph(&GraphRecords {
            nodes: vec![
                node("A", "investor", 1),
                node("B", "investor", 1),
                node("C", "investor", 1),
                node("T", "investor", 1),
            ],
            edges: vec![
                edge("A", "B", "co_investment", 0.5),
                edge("B", "C", "co_investment", 0.5),
                edge("C", "A", "co_investment", 0.5),
                edge("C", "T", "co_investment", 0.5),
            ],
        })
        .graph;
        let opts = PathOptions {
            max_hops: 4,
            max_results: 10,
            ..PathOptions::default()
        };
        let paths = search(&graph, "A", "T", &opts).unwrap();
        assert_eq!(paths.len(), 2);
        for p in &paths {
            let unique: BTreeSet<_> = p.nodes.iter().map(|n| n.id.clone()).collect();
            assert_eq!(unique.len(), p.nodes.len());
        }
    }

    #[test]
    fn test_visited_cap_bounds_work() {
        let graph = diamond();
        let opts = PathOptions {
            max_visited: 1,
            max_results: 10,
            ..PathOptions::default()
        };
        let paths = search(&graph, "A", "D", &opts).unwrap();
        assert!(paths.len() <= 1);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let graph = diamond();
        let err = find_paths(
            &graph,
            "A",
            "D",
            &PathOptions::default(),
            Deadline::at(Instant::now()),
        )
        .unwrap_err();
        assert!(matches!(err, WarmgraphError::Timeout(_)));
    }

    #[test]
    fn test_isolated_target_no_path() {
        let graph = build_graph(&GraphRecords {
            nodes: vec![node("A", "investor", 1), node("Z", "investor", 1)],
            edges: vec![],
        })
        .graph;
        assert!(search(&graph, "A", "Z", &PathOptions::default()).unwrap().is_empty());
    }

    /// xorshift64 step; a fixed seed yields the same graph every run
    fn next(seed: &mut u64) -> u64 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed
    }

    fn random_graph(seed: u64, n: usize, m: usize) -> Graph {
        let mut s = seed;
        let nodes = (0..n)
            .map(|i| node(&format!("n{i:02}"), "investor", (next(&mut s) % 4 + 1) as i64))
            .collect();
        let edges = (0..m)
            .map(|_| {
                let a = next(&mut s) as usize % n;
                let b = next(&mut s) as usize % n;
                let strength = (next(&mut s) % 10 + 1) as f64 / 10.0;
                let t = EdgeType::ALL[next(&mut s) as usize % 4];
                edge(&format!("n{a:02}"), &format!("n{b:02}"), t.as_str(), strength)
            })
            .collect();
        build_graph(&GraphRecords { nodes, edges }).graph
    }

    #[test]
    fn test_generated_graphs_respect_shape_and_order() {
        for seed in 1..=12u64 {
            let graph = random_graph(seed * 7919, 14, 40);
            for max_hops in 1..=3 {
                let opts = PathOptions {
                    max_hops,
                    max_results: 50,
                    ..PathOptions::default()
                };
                let paths = search(&graph, "n00", "n13", &opts).unwrap();
                for p in &paths {
                    assert!(p.hops >= 1 && p.hops <= max_hops);
                    assert_eq!(p.nodes.len(), p.hops + 1);
                    assert_eq!(p.nodes[0].id, "n00");
                    assert_eq!(p.nodes[p.hops].id, "n13");
                    for (i, e) in p.edges.iter().enumerate() {
                        assert_eq!(e.source, p.nodes[i].id);
                        assert_eq!(e.target, p.nodes[i + 1].id);
                    }
                }
                let mut resorted = paths.clone();
                resorted.sort_by(rank_order);
                assert_eq!(resorted, paths);
            }
        }
    }
}
