//! Store watcher: rebuild the graph when the SQLite file changes.
//!
//! A notify thread debounces content writes to the database file and its
//! journal; each quiet period after a burst triggers one
//! [`NetworkService::rebuild_if_changed`]. The rebuild's own reads never
//! bump the snapshot.

mod watcher;

pub use watcher::is_store_path;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::service::NetworkService;

/// Run the watcher until its thread exits. Rebuild failures are logged and
/// the previous snapshot stays in service.
pub async fn run_watcher(service: Arc<NetworkService>, debounce_ms: u64) -> Result<()> {
    let db_path = service.db().path().to_path_buf();
    let (tx, mut rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&db_path, debounce_ms, tx) {
            log::error!("watcher thread error: {}", e);
        }
    });

    while rx.recv().await.is_some() {
        match service.rebuild_if_changed().await {
            Ok(None) => log::debug!("watch: store touched but content unchanged"),
            Ok(Some(report)) => log::info!(
                "watch: store changed, snapshot v{} rebuilt ({} nodes, {} edges, {} warnings) in {} ms",
                report.version,
                report.nodes,
                report.edges,
                report.warning_count,
                report.elapsed_ms
            ),
            Err(e) => log::error!("watch: rebuild failed: {}", e),
        }
    }
    Ok(())
}
