//! Path scoring and the ranking order.
//!
//! Order: aggregate strength descending, then fewer hops, then lower mean
//! intermediate tier, then intermediate ids lexicographically. Paths between
//! the same endpoints never share an intermediate sequence, so this is total.

use std::cmp::Ordering;

use super::Path;
use crate::graph::Edge;

/// Product of the strengths along a path. Every factor is in (0, 1], so an
/// extra hop can never raise the score.
pub fn aggregate_strength(edges: &[Edge]) -> f64 {
    edges.iter().map(|e| e.strength).product()
}

pub fn rank_order(a: &Path, b: &Path) -> Ordering {
    b.aggregate_strength
        .total_cmp(&a.aggregate_strength)
        .then_with(|| a.hops.cmp(&b.hops))
        .then_with(|| {
            a.average_intermediate_tier()
                .total_cmp(&b.average_intermediate_tier())
        })
        .then_with(|| {
            let left = a.intermediates().iter().map(|n| n.id.as_str());
            let right = b.intermediates().iter().map(|n| n.id.as_str());
            left.cmp(right)
        })
}
