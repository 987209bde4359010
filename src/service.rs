//! Request-facing façade over the snapshot store, the result caches and the
//! search/extraction algorithms.
//!
//! Every search runs on the blocking pool against one immutable snapshot,
//! bounded by the configured request deadline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::Config;
use crate::db::{migrate, Db};
use crate::deadline::Deadline;
use crate::error::{Result, WarmgraphError};
use crate::graph::{build_graph, EdgeType, GraphRecords, GraphStore, NetworkStats, NodeKind};
use crate::intro;
use crate::loader;
use crate::paths::{find_paths, Path, PathOptions, PathSearch};
use crate::subgraph::{self, Subgraph, SubgraphFilters};

/// Build warnings kept verbatim in a report; the rest are only counted.
const REPORTED_WARNINGS: usize = 50;

/// Caller-facing path search parameters. Unset fields take configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathQuery {
    pub max_hops: Option<usize>,
    pub max_results: Option<usize>,
    /// Extra kinds allowed as intermediaries on top of investors.
    pub allow_intermediaries: Option<BTreeSet<NodeKind>>,
    pub connection_types: Option<BTreeSet<EdgeType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmIntroResponse {
    pub best_path: Option<Path>,
    pub paths: Vec<Path>,
    /// Introduction composed from `best_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
}

impl From<PathSearch> for WarmIntroResponse {
    fn from(search: PathSearch) -> Self {
        let introduction = search.best_path.as_ref().map(intro::compose);
        Self {
            best_path: search.best_path,
            paths: search.paths,
            introduction,
        }
    }
}

/// Outcome of a graph rebuild.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub version: u64,
    pub nodes: usize,
    pub edges: usize,
    pub warning_count: usize,
    pub warnings: Vec<String>,
    pub built_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub snapshot_version: u64,
    pub nodes: usize,
    pub edges: usize,
    pub built_at: DateTime<Utc>,
    pub path_cache: CacheStats,
    pub graph_cache: CacheStats,
}

pub struct NetworkService {
    db: Db,
    config: Config,
    store: GraphStore,
    path_cache: ResultCache<WarmIntroResponse>,
    graph_cache: ResultCache<Subgraph>,
    /// Serializes rebuilds; holds the fingerprint of the last loaded store.
    rebuild_lock: tokio::sync::Mutex<Option<String>>,
}

async fn run_blocking<T, F>(operation: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WarmgraphError::Internal(format!("{} task failed: {}", operation, e)))?
}

impl NetworkService {
    /// Create a service with an empty snapshot. Call [`rebuild`](Self::rebuild)
    /// to load the store.
    pub fn new(db: Db, config: Config) -> Self {
        let ttl = config.cache.ttl();
        let capacity = config.cache.capacity;
        Self {
            db,
            store: GraphStore::new(),
            path_cache: ResultCache::new(capacity, ttl),
            graph_cache: ResultCache::new(capacity, ttl),
            rebuild_lock: tokio::sync::Mutex::new(None),
            config,
        }
    }

    /// Open the configured store and apply pending migrations. The snapshot
    /// stays empty until the first rebuild.
    pub async fn open(config: Config) -> Result<Self> {
        let db = Db::new(config.db_path());
        let migrations_dir = config.migrations_dir().to_path_buf();
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await?;
        Ok(Self::new(db, config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Reload every record, publish a new snapshot and drop all cached results.
    pub async fn rebuild(&self) -> Result<BuildReport> {
        let mut last = self.rebuild_lock.lock().await;
        let started = Instant::now();
        let records = loader::load_records(&self.db).await?;
        *last = Some(loader::fingerprint(&records)?);
        self.publish(records, started).await
    }

    /// Rebuild only when the store content differs from the last load.
    /// Returns `None`, keeping the snapshot and caches, when nothing changed.
    pub async fn rebuild_if_changed(&self) -> Result<Option<BuildReport>> {
        let mut last = self.rebuild_lock.lock().await;
        let started = Instant::now();
        let records = loader::load_records(&self.db).await?;
        let current = loader::fingerprint(&records)?;
        if last.as_deref() == Some(current.as_str()) {
            return Ok(None);
        }
        *last = Some(current);
        self.publish(records, started).await.map(Some)
    }

    async fn publish(&self, records: GraphRecords, started: Instant) -> Result<BuildReport> {
        let outcome = run_blocking("graph build", move || Ok(build_graph(&records))).await?;

        let warning_count = outcome.warnings.len();
        let warnings = outcome
            .warnings
            .iter()
            .take(REPORTED_WARNINGS)
            .map(|w| w.to_string())
            .collect();
        let snapshot = self.store.replace(outcome.graph, warning_count);
        self.path_cache.clear();
        self.graph_cache.clear();

        Ok(BuildReport {
            version: snapshot.version,
            nodes: snapshot.graph.node_count(),
            edges: snapshot.graph.edge_count(),
            warning_count,
            warnings,
            built_at: snapshot.built_at,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    /// Resolve a query against configured defaults and caps.
    pub fn path_options(&self, query: &PathQuery) -> PathOptions {
        let paths = &self.config.paths;
        let mut options = PathOptions {
            max_hops: query
                .max_hops
                .unwrap_or(paths.default_max_hops)
                .min(paths.max_hops_cap),
            max_results: query.max_results.unwrap_or(paths.default_max_results),
            connection_types: query.connection_types.clone(),
            max_visited: paths.max_visited,
            ..PathOptions::default()
        };
        if paths.allow_firm_intermediaries {
            options = options.with_firm_intermediaries();
        }
        if let Some(extra) = &query.allow_intermediaries {
            options.intermediate_kinds.extend(extra.iter().copied());
        }
        options
    }

    /// Ranked warm-introduction paths from `source` to `target`.
    pub async fn warm_intros(
        &self,
        source: &str,
        target: &str,
        query: &PathQuery,
    ) -> Result<Arc<WarmIntroResponse>> {
        let snapshot = self.store.snapshot();
        let options = self.path_options(query);
        let key = CacheKey::for_request("paths", snapshot.version, &(source, target, &options))?;
        let deadline = Deadline::after(self.config.performance.request_timeout());
        let (source, target) = (source.to_string(), target.to_string());

        self.path_cache
            .get_or_compute(key, || async move {
                run_blocking("path search", move || {
                    let paths = find_paths(&snapshot.graph, &source, &target, &options, deadline)?;
                    Ok(WarmIntroResponse::from(PathSearch::from_ranked(paths)))
                })
                .await
            })
            .await
    }

    /// Visualization subgraph. `limit` defaults to and is clamped by config.
    pub async fn network_graph(
        &self,
        filters: SubgraphFilters,
        limit: Option<usize>,
    ) -> Result<Arc<Subgraph>> {
        let snapshot = self.store.snapshot();
        let limits = &self.config.subgraph;
        let budget = limit.unwrap_or(limits.default_limit).min(limits.max_limit);
        let key = CacheKey::for_request("graph", snapshot.version, &(&filters, budget))?;
        let deadline = Deadline::after(self.config.performance.request_timeout());

        self.graph_cache
            .get_or_compute(key, || async move {
                run_blocking("subgraph extraction", move || {
                    subgraph::extract(&snapshot.graph, &filters, budget, deadline)
                })
                .await
            })
            .await
    }

    /// Aggregate counts over the current snapshot.
    pub fn network_stats(&self) -> NetworkStats {
        NetworkStats::from_graph(&self.store.snapshot().graph)
    }

    pub fn status(&self) -> ServiceStatus {
        let snapshot = self.store.snapshot();
        ServiceStatus {
            snapshot_version: snapshot.version,
            nodes: snapshot.graph.node_count(),
            edges: snapshot.graph.edge_count(),
            built_at: snapshot.built_at,
            path_cache: self.path_cache.stats(),
            graph_cache: self.graph_cache.stats(),
        }
    }
}
