//! Collaborator interfaces
//!
//! The state machines talk to the host through an [`RpcSink`] and to the
//! local desktop through a [`UiSink`]. Both are injected; neither is reached
//! through global state.

use bytes::BufMut;
use std::path::PathBuf;
use tracing::warn;

use super::{DropEffect, SessionId, SessionRole};
use crate::clipboard::payload::{ClipboardPayload, Format};

/// Command sent to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCommand {
    /// Ask the host to write clipboard files into the encoded staging path
    RequestFiles { staging_path: Vec<u8> },
    /// The desktop accepted the host-initiated drag
    DragBeginDone,
    /// Drop effect the guest target currently reports
    UpdateFeedback { effect: DropEffect },
    /// Guest-side drop happened; files go to the encoded staging path
    DropDone { staging_path: Vec<u8> },
    /// A guest drag entered the host-facing area
    DragEnter { payload: ClipboardPayload },
    /// The guest drag was released at the given position
    Drop { x: i32, y: i32 },
    /// The guest drag left without dropping
    DragLeave,
}

impl RpcCommand {
    /// Command name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            RpcCommand::RequestFiles { .. } => "requestFiles",
            RpcCommand::DragBeginDone => "dragBeginDone",
            RpcCommand::UpdateFeedback { .. } => "updateFeedback",
            RpcCommand::DropDone { .. } => "dropDone",
            RpcCommand::DragEnter { .. } => "dragEnter",
            RpcCommand::Drop { .. } => "drop",
            RpcCommand::DragLeave => "dragLeave",
        }
    }

    /// Argument bytes.
    ///
    /// Paths are passed through as encoded. A payload is written as a
    /// sequence of `u8 format, u32 len, bytes` records; an item too large
    /// for the length field is left out. Integers are little-endian.
    pub fn args(&self) -> Vec<u8> {
        match self {
            RpcCommand::RequestFiles { staging_path } | RpcCommand::DropDone { staging_path } => {
                staging_path.clone()
            }
            RpcCommand::UpdateFeedback { effect } => vec![effect.to_wire()],
            RpcCommand::DragEnter { payload } => {
                let mut out = Vec::with_capacity(payload.total_size() + 5 * Format::ALL.len());
                for format in payload.formats() {
                    let Some(data) = payload.get_item(format) else {
                        continue;
                    };
                    let Ok(len) = u32::try_from(data.len()) else {
                        warn!("Skipping {:?} item of {} bytes in dragEnter", format, data.len());
                        continue;
                    };
                    out.put_u8(format_tag(format));
                    out.put_u32_le(len);
                    out.put_slice(data);
                }
                out
            }
            RpcCommand::Drop { x, y } => {
                let mut out = Vec::with_capacity(8);
                out.put_i32_le(*x);
                out.put_i32_le(*y);
                out
            }
            RpcCommand::DragBeginDone | RpcCommand::DragLeave => Vec::new(),
        }
    }
}

fn format_tag(format: Format) -> u8 {
    match format {
        Format::Text => 1,
        Format::RichText => 2,
        Format::FileList => 3,
        Format::FileContents => 4,
    }
}

/// Outbound RPC channel to the host
pub trait RpcSink: Send + Sync {
    /// Send a command tagged with `session`; false if it could not be sent
    fn send(&self, session: SessionId, command: &RpcCommand) -> bool;
}

/// Notification delivered to the desktop side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    /// Host clipboard contents are available for pasting
    ClipboardAvailable { payload: ClipboardPayload },
    /// Host started a drag into the guest
    DragStarted {
        payload: ClipboardPayload,
        staging_dir: Option<PathBuf>,
    },
    /// Host reported the drop position of its drag
    Dropped { x: i32, y: i32 },
    /// File transfer finished.
    ///
    /// For the copy-paste source `paths` are the delivered destination
    /// entries. For the drag source they point into the staging directory,
    /// which is removed right after the callback returns on success as well
    /// as failure; a desktop that keeps the files must copy or move them
    /// before returning.
    TransferFinished { success: bool, paths: Vec<PathBuf> },
    /// Host answered a guest drag enter
    DragEnterResult { accepted: bool },
    /// Host-side drop effect changed
    Feedback { effect: DropEffect },
    /// Host finished a guest-initiated drop
    DropFinished { success: bool },
    /// Host cancelled the transfer
    Cancelled,
    /// Session was reset after an unexpected event or failure
    Reset,
}

impl SessionNotification {
    pub fn name(&self) -> &'static str {
        match self {
            SessionNotification::ClipboardAvailable { .. } => "clipboardAvailable",
            SessionNotification::DragStarted { .. } => "dragStarted",
            SessionNotification::Dropped { .. } => "dropped",
            SessionNotification::TransferFinished { .. } => "transferFinished",
            SessionNotification::DragEnterResult { .. } => "dragEnterResult",
            SessionNotification::Feedback { .. } => "feedback",
            SessionNotification::DropFinished { .. } => "dropFinished",
            SessionNotification::Cancelled => "cancelled",
            SessionNotification::Reset => "reset",
        }
    }
}

/// Callback interface of the desktop integration
pub trait UiSink: Send + Sync {
    fn on_session_event(&self, role: SessionRole, event: &SessionNotification);
}
