//! File watching.
//!
//! Raw notify events are collected on a helper thread and delivered as
//! batches: the first event opens a 100 ms window, every path seen in that
//! window goes out together, deduplicated.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// How long a batch stays open after its first event.
pub const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Errors raised while setting up the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Create(notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch { path: PathBuf, source: notify::Error },
}

/// File watcher delivering batches of changed paths.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths` recursively. Missing paths are skipped.
    ///
    /// Returns the watcher, which must be kept alive, and a channel of
    /// batches.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<Vec<PathBuf>>), WatchError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(WatchError::Create)?;

        for path in paths {
            if !path.exists() {
                tracing::warn!("Not watching missing directory {}", path.display());
                continue;
            }
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| WatchError::Watch {
                    path: path.clone(),
                    source: e,
                })?;
            tracing::debug!("Watching {}", path.display());
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch = BTreeSet::new();
                collect(&mut batch, first);

                let deadline = Instant::now() + BATCH_WINDOW;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match sync_rx.recv_timeout(remaining) {
                        Ok(event) => collect(&mut batch, event),
                        Err(mpsc::RecvTimeoutError::Timeout) => break,
                        Err(mpsc::RecvTimeoutError::Disconnected) => return,
                    }
                }

                if batch.is_empty() {
                    continue;
                }
                if async_tx.blocking_send(batch.into_iter().collect()).is_err() {
                    return;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Add an event's paths to the batch unless it is a read-only access.
fn collect(batch: &mut BTreeSet<PathBuf>, event: notify::Event) {
    if is_relevant(&event.kind) {
        batch.extend(event.paths);
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn ignores_access_events() {
        assert!(!is_relevant(&EventKind::Access(AccessKind::Any)));
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
    }

    #[tokio::test]
    async fn batches_file_changes() {
        let temp = tempdir().unwrap();

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(temp.path().join("a.scss"), ".a{}").unwrap();
        fs::write(temp.path().join("b.scss"), ".b{}").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let batch = batch.expect("timeout waiting for file watch batch");
        let batch = batch.expect("channel should not be closed");
        assert!(batch.iter().any(|p| p.ends_with("a.scss")));
    }

    #[test]
    fn skips_missing_paths() {
        let temp = tempdir().unwrap();

        let result = FileWatcher::new(&[temp.path().join("missing")]);

        assert!(result.is_ok());
    }
}
