//! Hot-Reload Invalidator
//!
//! Watches the content tree and clears the whole cache after a burst of
//! relevant changes has gone quiet for [`DEBOUNCE_WINDOW`].
//!
//! Directories are registered one by one (non-recursively). New directories
//! are picked up from creation and move-in events; removed ones are never
//! unregistered.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::run_guarded;
use crate::cache::CacheStore;
use crate::resolver::SOURCE_EXTENSION;

/// Quiet period required before a burst of changes clears the cache
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher: {0}")]
    Init(#[from] notify::Error),
}

// == Watch Registry ==
/// Something that can start observing a single directory.
pub trait WatchRegistry: Send + 'static {
    fn watch_dir(&mut self, dir: &Path) -> notify::Result<()>;
}

impl WatchRegistry for RecommendedWatcher {
    fn watch_dir(&mut self, dir: &Path) -> notify::Result<()> {
        self.watch(dir, RecursiveMode::NonRecursive)
    }
}

// == Change Kind ==
/// Filesystem operation carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    /// Either side of a move, including a move into the tree
    Rename,
    Remove,
    /// Access and metadata-only changes
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Other,
            EventKind::Modify(_) => ChangeKind::Write,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => ChangeKind::Other,
        }
    }
}

/// Hidden files and editor backups (`name~`) never trigger anything.
fn is_ignored(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name.ends_with('~'))
}

fn is_source_document(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Writes and creates of source documents are relevant. Renames and removes
/// are always relevant since the old name may no longer be inspectable.
pub fn is_relevant(path: &Path, change: ChangeKind) -> bool {
    match change {
        ChangeKind::Create | ChangeKind::Write => is_source_document(path),
        ChangeKind::Rename | ChangeKind::Remove => true,
        ChangeKind::Other => false,
    }
}

// == Watch Set ==
/// Directories registered with a [`WatchRegistry`].
///
/// Every method may touch the filesystem; the event loop drives it from the
/// blocking pool.
pub struct WatchSet<W> {
    registry: W,
    /// Directories currently registered; only ever grows
    watched: HashSet<PathBuf>,
}

impl<W: WatchRegistry> WatchSet<W> {
    pub fn new(registry: W) -> Self {
        Self {
            registry,
            watched: HashSet::new(),
        }
    }

    pub fn watched_dirs(&self) -> &HashSet<PathBuf> {
        &self.watched
    }

    /// Registers `root` and every directory below it that is not yet watched.
    pub fn register_tree(&mut self, root: &Path) {
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!(path = %root.display(), err = %err, "Directory walk error");
                    continue;
                }
            };
            if !entry.file_type().is_dir() || self.watched.contains(entry.path()) {
                continue;
            }
            match self.registry.watch_dir(entry.path()) {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "Watching dir");
                    self.watched.insert(entry.path().to_path_buf());
                }
                Err(err) => {
                    error!(path = %entry.path().display(), err = %err, "Failed to add to watcher");
                }
            }
        }
    }

    /// Applies one notification. Returns true if it should (re)arm the
    /// debounce timer.
    pub fn handle_event(&mut self, event: &Event) -> bool {
        let change = ChangeKind::from(&event.kind);
        let mut relevant = false;

        for path in &event.paths {
            if is_ignored(path) {
                continue;
            }
            if matches!(change, ChangeKind::Create | ChangeKind::Rename) && path.is_dir() {
                debug!(path = %path.display(), ?change, "New directory detected");
                // Platform watches under a replaced tree died with its old inodes.
                self.watched.retain(|dir| !dir.starts_with(path));
                self.register_tree(path);
            }
            if is_relevant(path, change) {
                debug!(path = %path.display(), ?change, "Relevant change");
                relevant = true;
            }
        }

        relevant
    }
}

// == Invalidator ==
pub struct Invalidator<W> {
    store: Arc<CacheStore>,
    watch: WatchSet<W>,
}

impl<W: WatchRegistry> Invalidator<W> {
    pub fn new(store: Arc<CacheStore>, watch: WatchSet<W>) -> Self {
        Self { store, watch }
    }

    /// Event loop: `Watching` until a relevant event arrives, then
    /// `Debouncing` until the window passes with no further relevant events,
    /// at which point the store is cleared.
    pub async fn run(
        self,
        mut events: UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        let Invalidator { store, mut watch } = self;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stopping file watcher");
                    break;
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let store = store.clone();
                    run_guarded("invalidator", async move {
                        let removed = store.clear().await;
                        debug!(removed, "Content changed; cache cleared");
                    })
                    .await;
                }
                received = events.recv() => match received {
                    None => {
                        info!("File watcher channel closed");
                        break;
                    }
                    Some(Ok(event)) => {
                        let handled = tokio::task::spawn_blocking(move || {
                            let outcome = catch_unwind(AssertUnwindSafe(|| watch.handle_event(&event)));
                            (watch, event, outcome)
                        })
                        .await;

                        match handled {
                            Ok((returned, event, outcome)) => {
                                watch = returned;
                                match outcome {
                                    Ok(true) => deadline = Some(Instant::now() + DEBOUNCE_WINDOW),
                                    Ok(false) => {}
                                    Err(_) => error!(?event, "Panic recovered while handling watch event"),
                                }
                            }
                            Err(err) => {
                                error!(err = %err, "Watch event handler lost; stopping file watcher");
                                break;
                            }
                        }
                    }
                    Some(Err(err)) => error!(err = %err, "Watcher error"),
                },
            }
        }
    }
}

/// Starts watching `root` and spawns the invalidation loop.
///
/// The initial recursive registration completes before this returns.
/// Fails only if the platform watcher cannot be created; callers treat
/// that as a degraded start and keep serving without hot reload.
pub fn spawn_invalidator(
    store: Arc<CacheStore>,
    root: &Path,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, WatchError> {
    let (tx, rx) = unbounded_channel();
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;

    info!(root = %root.display(), "Hot reload enabled: initializing watcher");
    let mut watch = WatchSet::new(watcher);
    watch.register_tree(root);

    Ok(tokio::spawn(Invalidator::new(store, watch).run(rx, cancel)))
}
