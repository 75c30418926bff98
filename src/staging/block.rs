//! Filesystem block control
//!
//! While a staging directory is being populated, other guest processes must
//! not observe half-written files. The vmblock-fuse driver defers access to a
//! blocked path until the block is removed; it is driven by writing commands
//! to its control file:
//!
//! ```text
//! a<path>   add a block on <path>
//! d<path>   remove the block on <path>
//! ```

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default vmblock-fuse control file
pub const DEFAULT_BLOCK_CONTROL: &str = "/var/run/vmblock-fuse/dev";

const OP_ADD: u8 = b'a';
const OP_DEL: u8 = b'd';

/// Places and removes access blocks on staging directories
#[cfg_attr(test, mockall::automock)]
pub trait BlockControl: Send + Sync {
    /// Block access to `path`; false if the block could not be placed
    fn block(&self, path: &Path) -> bool;

    /// Remove a block placed by [`BlockControl::block`]
    fn unblock(&self, path: &Path);
}

/// vmblock-fuse control file client
pub struct FuseBlockControl {
    control: PathBuf,
    file: Mutex<Option<File>>,
}

impl FuseBlockControl {
    pub fn new(control: impl Into<PathBuf>) -> Self {
        Self {
            control: control.into(),
            file: Mutex::new(None),
        }
    }

    pub fn control_path(&self) -> &Path {
        &self.control
    }

    fn send(&self, op: u8, path: &Path) -> std::io::Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            *guard = Some(OpenOptions::new().write(true).open(&self.control)?);
        }

        let mut command = Vec::with_capacity(path.as_os_str().len() + 1);
        command.push(op);
        command.extend_from_slice(path.as_os_str().as_bytes());

        // one command per write; the driver parses each write separately
        let result = match guard.as_mut() {
            Some(file) => file.write_all(&command),
            None => Ok(()),
        };
        if result.is_err() {
            *guard = None;
        }
        result
    }
}

impl BlockControl for FuseBlockControl {
    fn block(&self, path: &Path) -> bool {
        match self.send(OP_ADD, path) {
            Ok(()) => {
                debug!("Blocked {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to block {} via {}: {}", path.display(), self.control.display(), e);
                false
            }
        }
    }

    fn unblock(&self, path: &Path) {
        match self.send(OP_DEL, path) {
            Ok(()) => debug!("Unblocked {}", path.display()),
            Err(e) => warn!("Failed to unblock {}: {}", path.display(), e),
        }
    }
}

impl std::fmt::Debug for FuseBlockControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseBlockControl")
            .field("control", &self.control)
            .finish()
    }
}

/// Used when blocking is disabled or the driver is absent
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBlockControl;

impl BlockControl for NoBlockControl {
    fn block(&self, _path: &Path) -> bool {
        false
    }

    fn unblock(&self, _path: &Path) {}
}

/// Pick a block control for the given settings
pub fn block_control_for(enabled: bool, control: &Path) -> Arc<dyn BlockControl> {
    if !enabled {
        info!("Staging directory blocking disabled");
        return Arc::new(NoBlockControl);
    }

    if !control.exists() {
        warn!(
            "Block control file {} not found, transfers will run unblocked",
            control.display()
        );
        return Arc::new(NoBlockControl);
    }

    info!("Using vmblock control file {}", control.display());
    Arc::new(FuseBlockControl::new(control))
}
