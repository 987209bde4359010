//! Watcher thread: notify + debounce, one signal per burst of store writes.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};

use crate::error::{Result, WarmgraphError};

/// True for the database file and its `-wal` / `-journal` siblings.
/// `-shm` is excluded: readers touch it too.
pub fn is_store_path(path: &Path, db_path: &Path) -> bool {
    let (Some(name), Some(db_name)) = (
        path.file_name().and_then(|n| n.to_str()),
        db_path.file_name().and_then(|n| n.to_str()),
    ) else {
        return false;
    };
    name == db_name
        || name == format!("{}-wal", db_name)
        || name == format!("{}-journal", db_name)
}

/// Content writes only. Opening and closing a WAL connection creates and
/// removes `-wal` without changing the store, so Create and Remove are ignored.
fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

/// Watch the directory holding `db_path` and send `()` on `tx` once writes
/// to the store have been quiet for `debounce_ms`. Exits when the receiver
/// is dropped or the watcher fails.
pub fn run_watcher_thread(
    db_path: &Path,
    debounce_ms: u64,
    tx: tokio::sync::mpsc::UnboundedSender<()>,
) -> Result<()> {
    let db_path = db_path.to_path_buf();
    let dir = match db_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let debounce = Duration::from_millis(debounce_ms);

    let (event_tx, event_rx) = mpsc::channel::<()>();
    let watched = db_path.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            if is_write(&ev.kind) && ev.paths.iter().any(|p| is_store_path(p, &watched)) {
                let _ = event_tx.send(());
            }
        }
    })
    .map_err(|e| WarmgraphError::Config(format!("store watcher: {}", e)))?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| WarmgraphError::Config(format!("watch {}: {}", dir.display(), e)))?;
    log::info!("Watching {} for changes", db_path.display());

    let mut last_event: Option<Instant> = None;
    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(()) => last_event = Some(Instant::now()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if last_event.is_some_and(|t| t.elapsed() >= debounce) {
                    last_event = None;
                    if tx.send(()).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}
