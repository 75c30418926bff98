//! Scripted event replay
//!
//! Drives the engine from a JSON-lines script instead of a hypervisor
//! transport. One event per line; blank lines and lines starting with `#`
//! are skipped.
//!
//! ```text
//! {"event":"drag_begin","session":3,"payload":{"files":[{"path":"a/"},{"path":"a/b.txt","size":12}]}}
//! {"event":"drag_begin_ack"}
//! {"event":"drop","session":3,"x":10,"y":20}
//! {"event":"get_files_done","session":3,"success":true}
//! ```

use parking_lot::Mutex;
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::info;

use crate::clipboard::error::{ClipboardError, Result};
use crate::clipboard::file_list::{FileAttributes, FileList};
use crate::clipboard::payload::{ClipboardPayload, Format};
use crate::manager::SessionEvent;
use crate::session::{
    DropEffect, RpcCommand, RpcEvent, RpcSink, SessionId, SessionNotification, SessionRole, UiEvent,
    UiSink,
};

/// File entry described inline in a script
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptFile {
    /// Relative path; a trailing `/` marks a directory
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Payload described in a script
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rich_text: Option<String>,
    /// Inline file list
    #[serde(default)]
    pub files: Vec<ScriptFile>,
    /// Local files and trees to list instead of inline entries
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl ScriptPayload {
    pub fn to_payload(&self, local_full_paths: bool) -> Result<ClipboardPayload> {
        let mut payload = ClipboardPayload::new();

        if let Some(text) = &self.text {
            payload.set_item(Format::Text, text.as_bytes().to_vec());
        }
        if let Some(rich) = &self.rich_text {
            payload.set_item(Format::RichText, rich.as_bytes().to_vec());
        }

        let list = if !self.paths.is_empty() {
            Some(FileList::from_paths(&self.paths)?)
        } else if !self.files.is_empty() {
            let mut list = FileList::new();
            for file in &self.files {
                list.add_file(&file.path, None)?;
                let attributes = if file.path.ends_with('/') {
                    FileAttributes::directory()
                } else {
                    match file.size {
                        Some(size) => FileAttributes::regular(size),
                        None => FileAttributes::default(),
                    }
                };
                list.add_file_attributes(attributes)?;
            }
            Some(list)
        } else {
            None
        };

        if let Some(list) = list {
            payload.set_item(Format::FileList, list.to_bytes(local_full_paths)?.to_vec());
        }
        Ok(payload)
    }
}

/// One line of a replay script
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    ClipboardReceived { session: u64, payload: ScriptPayload },
    DragBegin { session: u64, payload: ScriptPayload },
    Drop { session: u64, x: i32, y: i32 },
    Cancel { session: u64 },
    GetFilesDone { session: u64, success: bool },
    DragEnterReply { session: u64, accepted: bool },
    UpdateFeedback { session: u64, effect: DropEffect },
    DropDone { session: u64, success: bool },
    RequestFiles { dest_dir: PathBuf },
    DragBeginAck,
    Feedback { effect: DropEffect },
    DragEnter { payload: ScriptPayload },
    UiDrop { x: i32, y: i32 },
    DragLeave,
}

impl ScriptEvent {
    pub fn into_session_event(self, local_full_paths: bool) -> Result<SessionEvent> {
        let id = SessionId::new;
        Ok(match self {
            ScriptEvent::ClipboardReceived { session, payload } => RpcEvent::ClipboardReceived {
                session: id(session),
                payload: payload.to_payload(local_full_paths)?,
            }
            .into(),
            ScriptEvent::DragBegin { session, payload } => RpcEvent::DragBegin {
                session: id(session),
                payload: payload.to_payload(local_full_paths)?,
            }
            .into(),
            ScriptEvent::Drop { session, x, y } => RpcEvent::Drop {
                session: id(session),
                x,
                y,
            }
            .into(),
            ScriptEvent::Cancel { session } => RpcEvent::Cancel { session: id(session) }.into(),
            ScriptEvent::GetFilesDone { session, success } => RpcEvent::GetFilesDone {
                session: id(session),
                success,
            }
            .into(),
            ScriptEvent::DragEnterReply { session, accepted } => RpcEvent::DragEnterReply {
                session: id(session),
                accepted,
            }
            .into(),
            ScriptEvent::UpdateFeedback { session, effect } => RpcEvent::UpdateFeedback {
                session: id(session),
                effect,
            }
            .into(),
            ScriptEvent::DropDone { session, success } => RpcEvent::DropDone {
                session: id(session),
                success,
            }
            .into(),
            ScriptEvent::RequestFiles { dest_dir } => UiEvent::RequestFiles { dest_dir }.into(),
            ScriptEvent::DragBeginAck => UiEvent::DragBeginAck.into(),
            ScriptEvent::Feedback { effect } => UiEvent::Feedback { effect }.into(),
            ScriptEvent::DragEnter { payload } => UiEvent::DragEnter {
                payload: payload.to_payload(local_full_paths)?,
            }
            .into(),
            ScriptEvent::UiDrop { x, y } => UiEvent::Drop { x, y }.into(),
            ScriptEvent::DragLeave => UiEvent::DragLeave.into(),
        })
    }
}

/// Parse a JSON-lines script
pub fn parse_script<R: BufRead>(reader: R, local_full_paths: bool) -> Result<Vec<SessionEvent>> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let step: ScriptEvent = serde_json::from_str(trimmed)
            .map_err(|e| ClipboardError::InvalidData(format!("script line {}: {}", index + 1, e)))?;
        events.push(step.into_session_event(local_full_paths)?);
    }

    Ok(events)
}

// =============================================================================
// Logging sinks
// =============================================================================

/// RPC sink that logs and records every command
#[derive(Debug, Default)]
pub struct LoggingRpcSink {
    sent: Mutex<Vec<(SessionId, &'static str)>>,
}

impl LoggingRpcSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands sent so far as (session, name)
    pub fn sent(&self) -> Vec<(SessionId, &'static str)> {
        self.sent.lock().clone()
    }
}

impl RpcSink for LoggingRpcSink {
    fn send(&self, session: SessionId, command: &RpcCommand) -> bool {
        info!(
            "RPC send {} session={} ({} arg bytes)",
            command.name(),
            session,
            command.args().len()
        );
        self.sent.lock().push((session, command.name()));
        true
    }
}

/// UI sink that logs and records every notification
#[derive(Debug, Default)]
pub struct LoggingUiSink {
    events: Mutex<Vec<(SessionRole, &'static str)>>,
}

impl LoggingUiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(SessionRole, &'static str)> {
        self.events.lock().clone()
    }
}

impl UiSink for LoggingUiSink {
    fn on_session_event(&self, role: SessionRole, event: &SessionNotification) {
        match event {
            SessionNotification::TransferFinished { success, paths } => {
                info!("UI {:?} transfer finished: success={}", role, success);
                for path in paths {
                    info!("  staged {}", path.display());
                }
            }
            other => info!("UI {:?} {:?}", role, other),
        }
        self.events.lock().push((role, event.name()));
    }
}
