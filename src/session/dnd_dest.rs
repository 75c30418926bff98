//! Drag-and-drop destination
//!
//! A guest drag is handed to the host: the payload goes out with `dragEnter`,
//! the host assigns the session id in its reply, and the drop completes when
//! the host reports `dropDone`. No staging directory is involved.

use tracing::info;

use super::{
    DropEffect, RpcCommand, RpcEvent, SessionContext, SessionCore, SessionId, SessionMachine,
    SessionNotification, SessionRegistry, SessionRole, UiEvent,
};
use crate::clipboard::error::Result;
use crate::clipboard::payload::ClipboardPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragDestinationState {
    Ready,
    EnterPending,
    Entered,
    DropPending,
}

impl DragDestinationState {
    pub fn name(self) -> &'static str {
        match self {
            DragDestinationState::Ready => "Ready",
            DragDestinationState::EnterPending => "EnterPending",
            DragDestinationState::Entered => "Entered",
            DragDestinationState::DropPending => "DropPending",
        }
    }
}

pub struct DragDestination {
    core: SessionCore,
    state: DragDestinationState,
}

impl DragDestination {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            core: SessionCore::new(ctx, SessionRole::DestinationDragDrop),
            state: DragDestinationState::Ready,
        }
    }

    pub fn state(&self) -> DragDestinationState {
        self.state
    }

    pub fn snapshot(&self) -> &ClipboardPayload {
        &self.core.snapshot
    }

    fn on_drag_enter(&mut self, registry: &mut SessionRegistry, payload: ClipboardPayload) {
        if self.state != DragDestinationState::Ready {
            self.fail(registry, "dragEnter", "drag already entered");
            return;
        }

        match self.core.ctx.accept_payload(&payload) {
            Ok(snapshot) => self.core.snapshot = snapshot,
            Err(e) => {
                self.fail(registry, "dragEnter", &e.to_string());
                return;
            }
        }

        // id is still NONE; the host assigns one in its reply
        let command = RpcCommand::DragEnter {
            payload: self.core.snapshot.clone(),
        };
        if !self.core.send(command) {
            self.fail(registry, "dragEnter", "RPC send failed");
            return;
        }
        self.state = DragDestinationState::EnterPending;
    }

    fn on_drag_enter_reply(
        &mut self,
        registry: &mut SessionRegistry,
        id: SessionId,
        accepted: bool,
    ) {
        if self.state != DragDestinationState::EnterPending {
            self.fail(registry, "dragEnterReply", "no drag enter pending");
            return;
        }

        if !accepted {
            info!("Host rejected guest drag");
            self.core
                .notify(SessionNotification::DragEnterResult { accepted: false });
            self.finish(registry);
            return;
        }

        if let Err(e) = self.core.bind(registry, id) {
            self.fail(registry, "dragEnterReply", &e.to_string());
            return;
        }

        info!("Host accepted guest drag as session {}", id);
        self.core
            .notify(SessionNotification::DragEnterResult { accepted: true });
        self.state = DragDestinationState::Entered;
    }

    fn on_update_feedback(&mut self, registry: &mut SessionRegistry, effect: DropEffect) {
        if self.state != DragDestinationState::Entered {
            self.fail(registry, "updateFeedback", "not entered");
            return;
        }
        self.core.notify(SessionNotification::Feedback { effect });
    }

    fn on_drop(&mut self, registry: &mut SessionRegistry, x: i32, y: i32) {
        if self.state != DragDestinationState::Entered {
            self.fail(registry, "drop", "not entered");
            return;
        }
        if !self.core.send(RpcCommand::Drop { x, y }) {
            self.fail(registry, "drop", "RPC send failed");
            return;
        }
        self.state = DragDestinationState::DropPending;
    }

    fn on_drag_leave(&mut self, registry: &mut SessionRegistry) {
        match self.state {
            DragDestinationState::EnterPending | DragDestinationState::Entered => {
                // result ignored; the session ends either way
                let _ = self.core.send(RpcCommand::DragLeave);
                self.finish(registry);
            }
            _ => self.fail(registry, "dragLeave", "not entered"),
        }
    }

    fn on_drop_done(&mut self, registry: &mut SessionRegistry, success: bool) {
        if self.state != DragDestinationState::DropPending {
            self.fail(registry, "dropDone", "no drop pending");
            return;
        }
        info!("Guest drop {} finished: success={}", self.core.id, success);
        self.core.notify(SessionNotification::DropFinished { success });
        self.finish(registry);
    }

    fn on_cancel(&mut self, registry: &mut SessionRegistry) {
        if self.state == DragDestinationState::Ready {
            self.fail(registry, "cancel", "nothing to cancel");
            return;
        }
        info!("Guest drag {} cancelled in {}", self.core.id, self.state.name());
        self.core.notify(SessionNotification::Cancelled);
        self.finish(registry);
    }

    fn finish(&mut self, registry: &mut SessionRegistry) {
        self.core.clear(registry);
        self.state = DragDestinationState::Ready;
    }

    fn fail(&mut self, registry: &mut SessionRegistry, event: &str, reason: &str) {
        self.core.log_reset(self.state.name(), event, reason);
        if self.state != DragDestinationState::Ready {
            self.core.notify(SessionNotification::Reset);
        }
        self.finish(registry);
    }
}

impl SessionMachine for DragDestination {
    fn role(&self) -> SessionRole {
        SessionRole::DestinationDragDrop
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn session(&self) -> SessionId {
        self.core.id
    }

    fn is_ready(&self) -> bool {
        self.state == DragDestinationState::Ready
    }

    fn handle_rpc(&mut self, registry: &mut SessionRegistry, event: RpcEvent) -> Result<()> {
        match event {
            RpcEvent::DragEnterReply { session, accepted } => {
                self.on_drag_enter_reply(registry, session, accepted)
            }
            RpcEvent::UpdateFeedback { effect, .. } => self.on_update_feedback(registry, effect),
            RpcEvent::DropDone { success, .. } => self.on_drop_done(registry, success),
            RpcEvent::Cancel { .. } => self.on_cancel(registry),
            other => self.fail(registry, other.name(), "unexpected event"),
        }
        Ok(())
    }

    fn handle_ui(&mut self, registry: &mut SessionRegistry, event: UiEvent) -> Result<()> {
        match event {
            UiEvent::DragEnter { payload } => self.on_drag_enter(registry, payload),
            UiEvent::Drop { x, y } => self.on_drop(registry, x, y),
            UiEvent::DragLeave => self.on_drag_leave(registry),
            other => self.fail(registry, other.name(), "unexpected event"),
        }
        Ok(())
    }

    fn reset(&mut self, registry: &mut SessionRegistry, reason: &str) {
        self.fail(registry, "reset", reason);
    }
}

impl std::fmt::Debug for DragDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragDestination")
            .field("state", &self.state)
            .field("session", &self.core.id)
            .finish()
    }
}
