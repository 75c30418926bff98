//! Staging Directory Manager
//!
//! Received files land in a private per-transfer directory before they are
//! handed to the desktop. Each directory is represented by a [`StagingDir`]
//! guard: releasing it (explicitly, or on drop as a fallback) removes the
//! block once and deletes the tree once.
//!
//! # Layout
//!
//! ```text
//! $XDG_RUNTIME_DIR/lamco-dnd-staging/   0700, created on demand
//!   ├─ 17-3f2a9c.../                    one per active transfer
//!   └─ 18-b04e11.../
//! ```

pub mod block;

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub use block::{block_control_for, BlockControl, FuseBlockControl, NoBlockControl};

use crate::clipboard::error::{ClipboardError, Result};
use crate::session::SessionId;

/// Directory name under the runtime dir used when no root is configured
pub const STAGING_DIR_NAME: &str = "lamco-dnd-staging";

/// Default staging root for the current user
pub fn default_staging_root() -> PathBuf {
    let runtime_dir = dirs::runtime_dir().unwrap_or_else(|| {
        #[allow(unsafe_code)]
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/run/user/{}", uid))
    });

    runtime_dir.join(STAGING_DIR_NAME)
}

/// Creates staging directories under one root
#[derive(Clone)]
pub struct StagingManager {
    root: PathBuf,
    block: Arc<dyn BlockControl>,
    live: Arc<AtomicUsize>,
}

impl StagingManager {
    pub fn new(root: impl Into<PathBuf>, block: Arc<dyn BlockControl>) -> Self {
        Self {
            root: root.into(),
            block,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of created directories not yet released
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Create a staging directory for `session`.
    ///
    /// The name is unique; a collision is reported as a failure rather than
    /// retried.
    pub fn create(&self, session: SessionId) -> Result<StagingDir> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.root)
            .map_err(|e| {
                ClipboardError::StagingCreate(format!("root {}: {}", self.root.display(), e))
            })?;

        let path = self
            .root
            .join(format!("{}-{}", session, Uuid::new_v4().simple()));

        DirBuilder::new()
            .mode(0o700)
            .create(&path)
            .map_err(|e| ClipboardError::StagingCreate(format!("{}: {}", path.display(), e)))?;

        self.live.fetch_add(1, Ordering::SeqCst);
        info!("Created staging directory {} for session {}", path.display(), session);

        Ok(StagingDir {
            path,
            session,
            blocked: false,
            released: false,
            block: Arc::clone(&self.block),
            live: Arc::clone(&self.live),
        })
    }
}

impl std::fmt::Debug for StagingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingManager")
            .field("root", &self.root)
            .field("live", &self.live_count())
            .finish()
    }
}

/// Guard for one staging directory
pub struct StagingDir {
    path: PathBuf,
    session: SessionId,
    blocked: bool,
    released: bool,
    block: Arc<dyn BlockControl>,
    live: Arc<AtomicUsize>,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Place the access block; a failure is logged and the transfer
    /// continues unblocked
    pub fn block(&mut self) -> bool {
        if self.blocked {
            return true;
        }
        self.blocked = self.block.block(&self.path);
        if !self.blocked {
            warn!("Staging directory {} is not blocked", self.path.display());
        }
        self.blocked
    }

    pub fn unblock(&mut self) {
        if self.blocked {
            self.block.unblock(&self.path);
            self.blocked = false;
        }
    }

    /// Move the named top-level entries into `dest`.
    ///
    /// Uses rename, falling back to a recursive copy when `dest` is on
    /// another filesystem. Returns the final paths.
    pub fn move_entries_into(&self, names: &[&str], dest: &Path) -> Result<Vec<PathBuf>> {
        let mut moved = Vec::with_capacity(names.len());

        for name in names {
            let from = self.path.join(name);
            let to = dest.join(name);

            if !from.exists() {
                warn!("Staged entry {} missing, skipping", from.display());
                continue;
            }

            match std::fs::rename(&from, &to) {
                Ok(()) => {}
                Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
                    debug!("Cross-device move of {}, copying", from.display());
                    copy_tree(&from, &to)?;
                }
                Err(e) => return Err(e.into()),
            }
            moved.push(to);
        }

        Ok(moved)
    }

    /// Unblock and delete the tree.
    ///
    /// With `best_effort` a deletion failure is logged and swallowed.
    pub fn release(mut self, best_effort: bool) -> Result<()> {
        self.finish(best_effort)
    }

    fn finish(&mut self, best_effort: bool) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.unblock();
        self.live.fetch_sub(1, Ordering::SeqCst);

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!("Deleted staging directory {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) if best_effort => {
                warn!("Failed to delete staging directory {}: {}", self.path.display(), e);
                Ok(())
            }
            Err(e) => Err(ClipboardError::StagingDelete(format!("{}: {}", self.path.display(), e))),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.released {
            warn!("Staging directory {} dropped without release", self.path.display());
            let _ = self.finish(true);
        }
    }
}

impl std::fmt::Debug for StagingDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingDir")
            .field("path", &self.path)
            .field("session", &self.session)
            .field("blocked", &self.blocked)
            .finish()
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| ClipboardError::Io(e.into()))?;
        let suffix = entry
            .path()
            .strip_prefix(from)
            .map_err(|_| ClipboardError::InvalidPath(entry.path().display().to_string()))?;
        let target = to.join(suffix);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        } else {
            debug!("Not copying special file {}", entry.path().display());
        }
    }
    Ok(())
}
