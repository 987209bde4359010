//! Copy-on-write snapshot holder for the canonical graph.
//!
//! Readers clone an `Arc` under a short read lock and then work lock-free on
//! an immutable graph; a rebuild swaps the pointer under the write lock, so
//! searches already running keep the snapshot they started with.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::Graph;

/// An immutable, point-in-time instance of the canonical graph.
#[derive(Debug)]
pub struct GraphSnapshot {
    pub graph: Graph,
    /// Increases by one on every swap; 0 is the initial empty graph.
    pub version: u64,
    pub built_at: DateTime<Utc>,
    /// Records skipped or merged while building this snapshot.
    pub warning_count: usize,
}

/// Sole owner of the canonical graph.
pub struct GraphStore {
    current: RwLock<Arc<GraphSnapshot>>,
    versions: AtomicU64,
}

impl GraphStore {
    /// Start with an empty snapshot (version 0).
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(GraphSnapshot {
                graph: Graph::empty(),
                version: 0,
                built_at: Utc::now(),
                warning_count: 0,
            })),
            versions: AtomicU64::new(0),
        }
    }

    /// Current snapshot. Never observes a half-built graph.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Atomically publish a freshly built graph and return its snapshot.
    pub fn replace(&self, graph: Graph, warning_count: usize) -> Arc<GraphSnapshot> {
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(GraphSnapshot {
            graph,
            version,
            built_at: Utc::now(),
            warning_count,
        });
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snapshot);
        log::info!(
            "Graph snapshot v{} published: {} nodes, {} edges",
            version,
            snapshot.graph.node_count(),
            snapshot.graph.edge_count()
        );
        snapshot
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
