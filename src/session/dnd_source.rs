//! Drag-and-drop source
//!
//! The host drags content into the guest. When the payload carries files a
//! staging directory is created up front so the desktop can advertise
//! the staged paths; the host writes into it after the drop.
//!
//! ```text
//! Ready ─dragBegin─> DragBeginPending ─dragBeginAck─> Dragging ─drop─> AwaitingFiles
//!   ^                                                   │  feedback       │
//!   └──────────────── drop without files ───────────────┘                 │
//!   └──────────────────────────── getFilesDone ───────────────────────────┘
//! ```

use std::path::Path;
use tracing::info;

use super::{
    DropEffect, RpcCommand, RpcEvent, SessionContext, SessionCore, SessionId, SessionMachine,
    SessionNotification, SessionRegistry, SessionRole, UiEvent,
};
use crate::clipboard::error::Result;
use crate::clipboard::payload::ClipboardPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSourceState {
    Ready,
    DragBeginPending,
    Dragging,
    AwaitingFiles,
}

impl DragSourceState {
    pub fn name(self) -> &'static str {
        match self {
            DragSourceState::Ready => "Ready",
            DragSourceState::DragBeginPending => "DragBeginPending",
            DragSourceState::Dragging => "Dragging",
            DragSourceState::AwaitingFiles => "AwaitingFiles",
        }
    }
}

pub struct DragSource {
    core: SessionCore,
    state: DragSourceState,
}

impl DragSource {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            core: SessionCore::new(ctx, SessionRole::SourceDragDrop),
            state: DragSourceState::Ready,
        }
    }

    pub fn state(&self) -> DragSourceState {
        self.state
    }

    pub fn snapshot(&self) -> &ClipboardPayload {
        &self.core.snapshot
    }

    pub fn staging_path(&self) -> Option<&Path> {
        self.core.staging.as_ref().map(|dir| dir.path())
    }

    fn on_drag_begin(
        &mut self,
        registry: &mut SessionRegistry,
        id: SessionId,
        payload: ClipboardPayload,
    ) -> Result<()> {
        const EVENT: &str = "dragBegin";

        if self.state != DragSourceState::Ready {
            self.fail(registry, EVENT, &format!("drag {} already in progress", self.core.id));
            return Ok(());
        }

        match self.core.ctx.accept_payload(&payload) {
            Ok(snapshot) => self.core.snapshot = snapshot,
            Err(e) => {
                self.fail(registry, EVENT, &e.to_string());
                return Ok(());
            }
        }

        let has_files = match self.core.load_file_list() {
            Ok(has_files) => has_files,
            Err(e) => {
                self.fail(registry, EVENT, &e.to_string());
                return Ok(());
            }
        };

        let staging_dir = if has_files {
            match self.core.create_staging(id) {
                Ok(path) => Some(path),
                Err(e) => {
                    // abort before binding; nothing is visible to the host yet
                    self.core.snapshot.clear();
                    self.core.file_list = None;
                    return Err(e);
                }
            }
        } else {
            None
        };

        if let Err(e) = self.core.bind(registry, id) {
            self.fail(registry, EVENT, &e.to_string());
            return Ok(());
        }

        info!(
            "Host drag {} started with {:?}{}",
            id,
            self.core.snapshot,
            if has_files { ", files staged" } else { "" }
        );
        self.core.notify(SessionNotification::DragStarted {
            payload: self.core.snapshot.clone(),
            staging_dir,
        });
        self.state = DragSourceState::DragBeginPending;
        Ok(())
    }

    fn on_drag_begin_ack(&mut self, registry: &mut SessionRegistry) {
        if self.state != DragSourceState::DragBeginPending {
            self.fail(registry, "dragBeginAck", "no drag begin pending");
            return;
        }
        if !self.core.send(RpcCommand::DragBeginDone) {
            self.fail(registry, "dragBeginAck", "RPC send failed");
            return;
        }
        self.state = DragSourceState::Dragging;
    }

    fn on_feedback(&mut self, registry: &mut SessionRegistry, effect: DropEffect) {
        if self.state != DragSourceState::Dragging {
            self.fail(registry, "feedback", "not dragging");
            return;
        }
        if !self.core.send(RpcCommand::UpdateFeedback { effect }) {
            self.fail(registry, "feedback", "RPC send failed");
        }
    }

    fn on_drop(&mut self, registry: &mut SessionRegistry, x: i32, y: i32) {
        const EVENT: &str = "drop";

        if self.state != DragSourceState::Dragging {
            self.fail(registry, EVENT, "not dragging");
            return;
        }

        self.core.notify(SessionNotification::Dropped { x, y });

        if self.core.file_list.is_none() {
            info!("Host drag {} dropped at ({}, {})", self.core.id, x, y);
            self.finish(registry);
            return;
        }

        let arg = match self.core.staging_arg() {
            Ok(arg) => arg,
            Err(e) => {
                self.fail(registry, EVENT, &e.to_string());
                return;
            }
        };
        if !self.core.send(RpcCommand::DropDone { staging_path: arg }) {
            self.fail(registry, EVENT, "RPC send failed");
            return;
        }
        self.state = DragSourceState::AwaitingFiles;
    }

    fn on_get_files_done(&mut self, registry: &mut SessionRegistry, success: bool) {
        if self.state != DragSourceState::AwaitingFiles {
            self.fail(registry, "getFilesDone", "not awaiting files");
            return;
        }

        let paths = match (&self.core.file_list, &self.core.staging) {
            (Some(list), Some(dir)) if success => list.staged_paths(dir.path()),
            _ => Vec::new(),
        };

        info!(
            "Host drag {} files delivered: success={} ({} entries)",
            self.core.id,
            success,
            paths.len()
        );
        self.core
            .notify(SessionNotification::TransferFinished { success, paths });
        self.finish(registry);
    }

    fn on_cancel(&mut self, registry: &mut SessionRegistry) {
        if self.state == DragSourceState::Ready {
            self.fail(registry, "cancel", "nothing to cancel");
            return;
        }
        info!("Host drag {} cancelled in {}", self.core.id, self.state.name());
        self.core.notify(SessionNotification::Cancelled);
        self.finish(registry);
    }

    fn finish(&mut self, registry: &mut SessionRegistry) {
        self.core.clear(registry);
        self.state = DragSourceState::Ready;
    }

    fn fail(&mut self, registry: &mut SessionRegistry, event: &str, reason: &str) {
        self.core.log_reset(self.state.name(), event, reason);
        if self.state != DragSourceState::Ready {
            self.core.notify(SessionNotification::Reset);
        }
        self.finish(registry);
    }
}

impl SessionMachine for DragSource {
    fn role(&self) -> SessionRole {
        SessionRole::SourceDragDrop
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn session(&self) -> SessionId {
        self.core.id
    }

    fn is_ready(&self) -> bool {
        self.state == DragSourceState::Ready
    }

    fn handle_rpc(&mut self, registry: &mut SessionRegistry, event: RpcEvent) -> Result<()> {
        match event {
            RpcEvent::DragBegin { session, payload } => {
                return self.on_drag_begin(registry, session, payload)
            }
            RpcEvent::Drop { x, y, .. } => self.on_drop(registry, x, y),
            RpcEvent::GetFilesDone { success, .. } => self.on_get_files_done(registry, success),
            RpcEvent::Cancel { .. } => self.on_cancel(registry),
            other => self.fail(registry, other.name(), "unexpected event"),
        }
        Ok(())
    }

    fn handle_ui(&mut self, registry: &mut SessionRegistry, event: UiEvent) -> Result<()> {
        match event {
            UiEvent::DragBeginAck => self.on_drag_begin_ack(registry),
            UiEvent::Feedback { effect } => self.on_feedback(registry, effect),
            other => self.fail(registry, other.name(), "unexpected event"),
        }
        Ok(())
    }

    fn reset(&mut self, registry: &mut SessionRegistry, reason: &str) {
        self.fail(registry, "reset", reason);
    }
}

impl std::fmt::Debug for DragSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragSource")
            .field("state", &self.state)
            .field("session", &self.core.id)
            .field("staging", &self.core.staging)
            .finish()
    }
}
