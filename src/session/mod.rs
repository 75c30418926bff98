//! Transfer Session State Machines
//!
//! One state machine per role drives a single transfer from initiation to
//! completion or cancellation. Machines consume [`RpcEvent`]s from the host
//! and [`UiEvent`]s from the desktop, and emit [`RpcCommand`]s and
//! [`SessionNotification`]s through injected sinks.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────── SessionRegistry ───────────────┐
//!   RpcEvent ───> │ id -> role (fencing)                           │
//!                 └──────┬──────────────────┬───────────────┬──────┘
//!                        v                  v               v
//!               CopyPasteSource     DragSource       DragDestination
//!                 │        │          │      │          │       │
//!                 │     StagingDir <──┘      │          │       │
//!                 v                          v          v       v
//!              RpcSink                    UiSink      RpcSink  UiSink
//! ```
//!
//! Any (state, event) pair a machine does not list resets it to Ready:
//! staging directory removed, session id released, snapshot cleared.

pub mod copy_paste;
pub mod dnd_dest;
pub mod dnd_source;
pub mod registry;
pub mod sink;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub use copy_paste::{CopyPasteSource, CopyPasteState};
pub use dnd_dest::{DragDestination, DragDestinationState};
pub use dnd_source::{DragSource, DragSourceState};
pub use registry::SessionRegistry;
pub use sink::{RpcCommand, RpcSink, SessionNotification, UiSink};

use crate::clipboard::error::{ClipboardError, Result};
use crate::clipboard::file_list::FileList;
use crate::clipboard::path::encode_full_path;
use crate::clipboard::payload::{ClipboardPayload, Format};
use crate::config::TransferConfig;
use crate::staging::{StagingDir, StagingManager};

// =============================================================================
// Identifiers
// =============================================================================

/// Host-issued session identifier; 0 means no session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const NONE: SessionId = SessionId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a session plays on this endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionRole {
    /// Host clipboard pasted into the guest
    SourceCopyPaste,
    /// Host drag dropped into the guest
    SourceDragDrop,
    /// Guest drag delivered to the host
    DestinationDragDrop,
}

/// Drop effect reported during a drag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropEffect {
    #[default]
    None,
    Copy,
    Move,
    Link,
}

impl DropEffect {
    pub fn to_wire(self) -> u8 {
        match self {
            DropEffect::None => 0,
            DropEffect::Copy => 1,
            DropEffect::Move => 2,
            DropEffect::Link => 4,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event arriving from the host
#[derive(Clone)]
pub enum RpcEvent {
    /// Host clipboard changed
    ClipboardReceived {
        session: SessionId,
        payload: ClipboardPayload,
    },
    /// Host started dragging into the guest
    DragBegin {
        session: SessionId,
        payload: ClipboardPayload,
    },
    /// Host drag was released over the guest
    Drop { session: SessionId, x: i32, y: i32 },
    /// Host aborted the transfer
    Cancel { session: SessionId },
    /// Host finished writing files to the staging path
    GetFilesDone { session: SessionId, success: bool },
    /// Host answered a guest dragEnter; `session` is the id it assigned
    DragEnterReply { session: SessionId, accepted: bool },
    /// Host-side target changed its drop effect
    UpdateFeedback {
        session: SessionId,
        effect: DropEffect,
    },
    /// Host finished a guest-initiated drop
    DropDone { session: SessionId, success: bool },
}

impl RpcEvent {
    pub fn session(&self) -> SessionId {
        match self {
            RpcEvent::ClipboardReceived { session, .. }
            | RpcEvent::DragBegin { session, .. }
            | RpcEvent::Drop { session, .. }
            | RpcEvent::Cancel { session }
            | RpcEvent::GetFilesDone { session, .. }
            | RpcEvent::DragEnterReply { session, .. }
            | RpcEvent::UpdateFeedback { session, .. }
            | RpcEvent::DropDone { session, .. } => *session,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RpcEvent::ClipboardReceived { .. } => "hostClipboardReceived",
            RpcEvent::DragBegin { .. } => "dragBegin",
            RpcEvent::Drop { .. } => "drop",
            RpcEvent::Cancel { .. } => "cancel",
            RpcEvent::GetFilesDone { .. } => "getFilesDone",
            RpcEvent::DragEnterReply { .. } => "dragEnterReply",
            RpcEvent::UpdateFeedback { .. } => "updateFeedback",
            RpcEvent::DropDone { .. } => "dropDone",
        }
    }

    /// Events routed by role rather than by registry lookup
    pub fn opens_session(&self) -> bool {
        matches!(
            self,
            RpcEvent::ClipboardReceived { .. }
                | RpcEvent::DragBegin { .. }
                | RpcEvent::DragEnterReply { .. }
        )
    }
}

impl std::fmt::Debug for RpcEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcEvent::ClipboardReceived { session, payload }
            | RpcEvent::DragBegin { session, payload } => {
                write!(f, "{}(session={}, payload={:?})", self.name(), session, payload)
            }
            RpcEvent::Drop { session, x, y } => {
                write!(f, "drop(session={}, x={}, y={})", session, x, y)
            }
            RpcEvent::Cancel { session } => write!(f, "cancel(session={})", session),
            RpcEvent::GetFilesDone { session, success }
            | RpcEvent::DropDone { session, success } => {
                write!(f, "{}(session={}, success={})", self.name(), session, success)
            }
            RpcEvent::DragEnterReply { session, accepted } => {
                write!(f, "dragEnterReply(session={}, accepted={})", session, accepted)
            }
            RpcEvent::UpdateFeedback { session, effect } => {
                write!(f, "updateFeedback(session={}, effect={:?})", session, effect)
            }
        }
    }
}

/// Event arriving from the desktop
#[derive(Clone)]
pub enum UiEvent {
    /// Paste of host files into `dest_dir`
    RequestFiles { dest_dir: PathBuf },
    /// Desktop took over the host-initiated drag
    DragBeginAck,
    /// Guest target under the pointer changed its drop effect
    Feedback { effect: DropEffect },
    /// Guest drag entered the host-facing area
    DragEnter { payload: ClipboardPayload },
    /// Guest drag released over the host-facing area
    Drop { x: i32, y: i32 },
    /// Guest drag left without dropping
    DragLeave,
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::RequestFiles { .. } => "requestFiles",
            UiEvent::DragBeginAck => "dragBeginAck",
            UiEvent::Feedback { .. } => "feedback",
            UiEvent::DragEnter { .. } => "dragEnter",
            UiEvent::Drop { .. } => "drop",
            UiEvent::DragLeave => "dragLeave",
        }
    }

    /// Role whose machine consumes this event
    pub fn role(&self) -> SessionRole {
        match self {
            UiEvent::RequestFiles { .. } => SessionRole::SourceCopyPaste,
            UiEvent::DragBeginAck | UiEvent::Feedback { .. } => SessionRole::SourceDragDrop,
            UiEvent::DragEnter { .. } | UiEvent::Drop { .. } | UiEvent::DragLeave => {
                SessionRole::DestinationDragDrop
            }
        }
    }
}

impl std::fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::RequestFiles { dest_dir } => write!(f, "requestFiles({})", dest_dir.display()),
            UiEvent::Feedback { effect } => write!(f, "feedback({:?})", effect),
            UiEvent::DragEnter { payload } => write!(f, "dragEnter({:?})", payload),
            UiEvent::Drop { x, y } => write!(f, "drop(x={}, y={})", x, y),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Machine plumbing
// =============================================================================

/// Collaborators shared by all machines
#[derive(Clone)]
pub struct SessionContext {
    pub rpc: Arc<dyn RpcSink>,
    pub ui: Arc<dyn UiSink>,
    pub staging: StagingManager,
    pub transfer: TransferConfig,
}

impl SessionContext {
    pub fn new(
        rpc: Arc<dyn RpcSink>,
        ui: Arc<dyn UiSink>,
        staging: StagingManager,
        transfer: TransferConfig,
    ) -> Self {
        Self {
            rpc,
            ui,
            staging,
            transfer,
        }
    }

    /// Apply size and format policy to a session-opening payload
    pub fn accept_payload(&self, payload: &ClipboardPayload) -> Result<ClipboardPayload> {
        let size = payload.total_size();
        if size > self.transfer.max_payload_size {
            return Err(ClipboardError::DataSizeExceeded(size, self.transfer.max_payload_size));
        }

        let mut snapshot = ClipboardPayload::new();
        snapshot.copy_from(payload)?;

        if !self.transfer.enable_rich_text && snapshot.remove_item(Format::RichText).is_some() {
            debug!("Dropping rich text item, rich text disabled");
        }
        if !self.transfer.enable_files && snapshot.remove_item(Format::FileList).is_some() {
            debug!("Dropping file list item, file transfer disabled");
        }

        Ok(snapshot)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("staging", &self.staging)
            .field("transfer", &self.transfer)
            .finish()
    }
}

/// State every role keeps regardless of its transition table
struct SessionCore {
    ctx: SessionContext,
    role: SessionRole,
    id: SessionId,
    snapshot: ClipboardPayload,
    file_list: Option<FileList>,
    staging: Option<StagingDir>,
}

impl SessionCore {
    fn new(ctx: SessionContext, role: SessionRole) -> Self {
        Self {
            ctx,
            role,
            id: SessionId::NONE,
            snapshot: ClipboardPayload::new(),
            file_list: None,
            staging: None,
        }
    }

    fn notify(&self, event: SessionNotification) {
        debug!("{:?} -> UI {}", self.role, event.name());
        self.ctx.ui.on_session_event(self.role, &event);
    }

    fn send(&self, command: RpcCommand) -> bool {
        debug!("{:?} session {} -> RPC {}", self.role, self.id, command.name());
        let sent = self.ctx.rpc.send(self.id, &command);
        if !sent {
            warn!("{:?} session {}: RPC {} failed", self.role, self.id, command.name());
        }
        sent
    }

    fn bind(&mut self, registry: &mut SessionRegistry, id: SessionId) -> Result<()> {
        registry.bind(id, self.role)?;
        self.id = id;
        Ok(())
    }

    /// Decode the snapshot's file list, if any
    fn load_file_list(&mut self) -> Result<bool> {
        self.file_list = match self.snapshot.get_item(Format::FileList) {
            Some(data) => Some(FileList::from_bytes(data)?),
            None => None,
        };
        Ok(self.file_list.is_some())
    }

    /// Create and block a staging directory for `id`
    fn create_staging(&mut self, id: SessionId) -> Result<PathBuf> {
        let mut dir = self.ctx.staging.create(id)?;
        dir.block();
        let path = dir.path().to_path_buf();
        self.staging = Some(dir);
        Ok(path)
    }

    /// Staging path encoded for an RPC argument
    fn staging_arg(&self) -> Result<Vec<u8>> {
        let dir = self
            .staging
            .as_ref()
            .ok_or_else(|| ClipboardError::InvalidState("no staging directory".to_string()))?;
        encode_full_path(dir.path(), self.ctx.transfer.local_full_paths)
    }

    fn release_staging(&mut self) {
        if let Some(dir) = self.staging.take() {
            // best effort: release logs a failed delete itself
            let _ = dir.release(true);
        }
    }

    /// Release everything the session holds
    fn clear(&mut self, registry: &mut SessionRegistry) {
        self.release_staging();
        if !self.id.is_none() {
            registry.release(self.id);
            self.id = SessionId::NONE;
        }
        self.snapshot.clear();
        self.file_list = None;
    }

    fn log_reset(&self, state: &'static str, event: &str, reason: &str) {
        warn!(
            "{:?} session {} reset from {} on {}: {}",
            self.role, self.id, state, event, reason
        );
    }
}

/// Common surface of the three role machines
pub trait SessionMachine {
    fn role(&self) -> SessionRole;

    /// Current state name, for logging
    fn state_name(&self) -> &'static str;

    /// Bound session id, [`SessionId::NONE`] when idle
    fn session(&self) -> SessionId;

    fn is_ready(&self) -> bool;

    fn handle_rpc(&mut self, registry: &mut SessionRegistry, event: RpcEvent) -> Result<()>;

    fn handle_ui(&mut self, registry: &mut SessionRegistry, event: UiEvent) -> Result<()>;

    /// Force the machine back to Ready, releasing everything it holds
    fn reset(&mut self, registry: &mut SessionRegistry, reason: &str);
}
