//! Copy-paste source
//!
//! Host clipboard contents are snapshotted on arrival. When the desktop pastes
//! files, a staging directory is created, its path is sent with
//! `requestFiles`, and the staged entries are moved to the paste destination
//! once the host reports completion.
//!
//! ```text
//! Ready ──requestFiles──> FileCopyInFlight ──getFilesDone──> Ready
//!   ^ hostClipboardReceived (rebinds)
//! ```

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{
    RpcCommand, RpcEvent, SessionContext, SessionCore, SessionId, SessionMachine,
    SessionNotification, SessionRegistry, SessionRole, UiEvent,
};
use crate::clipboard::error::Result;
use crate::clipboard::payload::{ClipboardPayload, Format};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPasteState {
    Ready,
    FileCopyInFlight,
}

impl CopyPasteState {
    pub fn name(self) -> &'static str {
        match self {
            CopyPasteState::Ready => "Ready",
            CopyPasteState::FileCopyInFlight => "FileCopyInFlight",
        }
    }
}

pub struct CopyPasteSource {
    core: SessionCore,
    state: CopyPasteState,
    dest_dir: Option<PathBuf>,
}

impl CopyPasteSource {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            core: SessionCore::new(ctx, SessionRole::SourceCopyPaste),
            state: CopyPasteState::Ready,
            dest_dir: None,
        }
    }

    pub fn state(&self) -> CopyPasteState {
        self.state
    }

    /// Clipboard contents retained for the current session
    pub fn snapshot(&self) -> &ClipboardPayload {
        &self.core.snapshot
    }

    pub fn staging_path(&self) -> Option<&Path> {
        self.core.staging.as_ref().map(|dir| dir.path())
    }

    fn on_clipboard_received(
        &mut self,
        registry: &mut SessionRegistry,
        id: SessionId,
        payload: ClipboardPayload,
    ) -> Result<()> {
        if self.state != CopyPasteState::Ready {
            self.fail(registry, "hostClipboardReceived", "file copy already in flight");
            return Ok(());
        }

        let snapshot = match self.core.ctx.accept_payload(&payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.fail(registry, "hostClipboardReceived", &e.to_string());
                return Ok(());
            }
        };

        // a newer host clipboard supersedes the previous one
        if !self.core.id.is_none() && self.core.id != id {
            registry.release(self.core.id);
            self.core.id = SessionId::NONE;
        }
        if let Err(e) = self.core.bind(registry, id) {
            self.fail(registry, "hostClipboardReceived", &e.to_string());
            return Ok(());
        }

        info!("Host clipboard received for session {}: {:?}", id, snapshot);
        self.core.snapshot = snapshot;
        self.core.notify(SessionNotification::ClipboardAvailable {
            payload: self.core.snapshot.clone(),
        });
        Ok(())
    }

    fn on_request_files(
        &mut self,
        registry: &mut SessionRegistry,
        dest_dir: PathBuf,
    ) -> Result<()> {
        const EVENT: &str = "requestFiles";

        if self.state != CopyPasteState::Ready {
            self.fail(registry, EVENT, "file copy already in flight");
            return Ok(());
        }
        if self.core.id.is_none() {
            self.fail(registry, EVENT, "no host clipboard session");
            return Ok(());
        }
        if !self.core.snapshot.item_exists(Format::FileList) {
            self.fail(registry, EVENT, "clipboard holds no files");
            return Ok(());
        }
        if let Err(e) = self.core.load_file_list() {
            self.fail(registry, EVENT, &e.to_string());
            return Ok(());
        }

        // creation failure aborts before anything is sent; state unchanged
        let id = self.core.id;
        if let Err(e) = self.core.create_staging(id) {
            self.core.file_list = None;
            return Err(e);
        }

        let arg = match self.core.staging_arg() {
            Ok(arg) => arg,
            Err(e) => {
                self.fail(registry, EVENT, &e.to_string());
                return Ok(());
            }
        };

        if !self.core.send(RpcCommand::RequestFiles { staging_path: arg }) {
            self.fail(registry, EVENT, "RPC send failed");
            return Ok(());
        }

        self.dest_dir = Some(dest_dir);
        self.state = CopyPasteState::FileCopyInFlight;
        Ok(())
    }

    fn on_get_files_done(&mut self, registry: &mut SessionRegistry, success: bool) {
        if self.state != CopyPasteState::FileCopyInFlight {
            self.fail(registry, "getFilesDone", "no file copy in flight");
            return;
        }

        let mut delivered = success;
        let mut paths = Vec::new();
        if success {
            match self.deliver() {
                Ok(moved) => paths = moved,
                Err(e) => {
                    warn!("Failed to move staged files for session {}: {}", self.core.id, e);
                    delivered = false;
                }
            }
        }

        info!(
            "File copy for session {} finished: success={} ({} entries)",
            self.core.id,
            delivered,
            paths.len()
        );
        self.core.notify(SessionNotification::TransferFinished {
            success: delivered,
            paths,
        });
        self.finish(registry);
    }

    /// Move staged top-level entries into the paste destination
    fn deliver(&self) -> Result<Vec<PathBuf>> {
        let (Some(staging), Some(dest), Some(list)) =
            (&self.core.staging, &self.dest_dir, &self.core.file_list)
        else {
            return Ok(Vec::new());
        };

        std::fs::create_dir_all(dest)?;
        let names: Vec<&str> = list
            .entries()
            .iter()
            .filter(|e| e.is_top_level())
            .map(|e| e.relative_path.as_str())
            .collect();
        staging.move_entries_into(&names, dest)
    }

    fn on_cancel(&mut self, registry: &mut SessionRegistry) {
        if self.state == CopyPasteState::Ready {
            self.fail(registry, "cancel", "nothing to cancel");
            return;
        }
        info!("File copy for session {} cancelled by host", self.core.id);
        self.core.notify(SessionNotification::Cancelled);
        self.finish(registry);
    }

    fn finish(&mut self, registry: &mut SessionRegistry) {
        self.core.clear(registry);
        self.dest_dir = None;
        self.state = CopyPasteState::Ready;
    }

    fn fail(&mut self, registry: &mut SessionRegistry, event: &str, reason: &str) {
        self.core.log_reset(self.state.name(), event, reason);
        if self.state != CopyPasteState::Ready {
            self.core.notify(SessionNotification::Reset);
        }
        self.finish(registry);
    }
}

impl SessionMachine for CopyPasteSource {
    fn role(&self) -> SessionRole {
        SessionRole::SourceCopyPaste
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn session(&self) -> SessionId {
        self.core.id
    }

    fn is_ready(&self) -> bool {
        self.state == CopyPasteState::Ready
    }

    fn handle_rpc(&mut self, registry: &mut SessionRegistry, event: RpcEvent) -> Result<()> {
        match event {
            RpcEvent::ClipboardReceived { session, payload } => {
                self.on_clipboard_received(registry, session, payload)
            }
            RpcEvent::GetFilesDone { success, .. } => {
                self.on_get_files_done(registry, success);
                Ok(())
            }
            RpcEvent::Cancel { .. } => {
                self.on_cancel(registry);
                Ok(())
            }
            other => {
                self.fail(registry, other.name(), "unexpected event");
                Ok(())
            }
        }
    }

    fn handle_ui(&mut self, registry: &mut SessionRegistry, event: UiEvent) -> Result<()> {
        match event {
            UiEvent::RequestFiles { dest_dir } => self.on_request_files(registry, dest_dir),
            other => {
                self.fail(registry, other.name(), "unexpected event");
                Ok(())
            }
        }
    }

    fn reset(&mut self, registry: &mut SessionRegistry, reason: &str) {
        self.fail(registry, "reset", reason);
    }
}

impl std::fmt::Debug for CopyPasteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyPasteSource")
            .field("state", &self.state)
            .field("session", &self.core.id)
            .field("staging", &self.core.staging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn received(harness: &mut Harness, id: u64) -> CopyPasteSource {
        let mut source = CopyPasteSource::new(harness.ctx.clone());
        source
            .handle_rpc(
                &mut harness.registry,
                RpcEvent::ClipboardReceived {
                    session: SessionId::new(id),
                    payload: file_payload(),
                },
            )
            .unwrap();
        source
    }

    #[test]
    fn test_clipboard_received_binds_and_notifies() {
        let mut harness = Harness::new();
        let source = received(&mut harness, 11);

        assert_eq!(source.state(), CopyPasteState::Ready);
        assert_eq!(source.session(), SessionId::new(11));
        assert_eq!(
            harness.registry.lookup(SessionId::new(11)),
            Some(SessionRole::SourceCopyPaste)
        );
        assert_eq!(harness.ui.names(), vec!["clipboardAvailable"]);
    }

    #[test]
    fn test_request_files_sends_staging_path() {
        let mut harness = Harness::new();
        let mut source = received(&mut harness, 11);

        source
            .handle_ui(
                &mut harness.registry,
                UiEvent::RequestFiles {
                    dest_dir: PathBuf::from("/tmp/x"),
                },
            )
            .unwrap();

        assert_eq!(source.state(), CopyPasteState::FileCopyInFlight);
        assert_eq!(harness.staged_dirs(), 1);

        let sent = harness.rpc.sent.lock();
        assert_eq!(sent.len(), 1);
        let (id, command) = &sent[0];
        assert_eq!(*id, SessionId::new(11));
        let expected = crate::clipboard::path::to_cp_name(source.staging_path().unwrap()).unwrap();
        assert_eq!(command, &RpcCommand::RequestFiles { staging_path: expected });
    }

    #[test]
    fn test_get_files_done_moves_entries() {
        let mut harness = Harness::new();
        let dest = harness.temp.path().join("dest");
        let mut source = received(&mut harness, 3);

        source
            .handle_ui(
                &mut harness.registry,
                UiEvent::RequestFiles {
                    dest_dir: dest.clone(),
                },
            )
            .unwrap();

        let staging = source.staging_path().unwrap().to_path_buf();
        for name in ["one.txt", "two.txt", "three.txt"] {
            std::fs::write(staging.join(name), b"data").unwrap();
        }

        source
            .handle_rpc(
                &mut harness.registry,
                RpcEvent::GetFilesDone {
                    session: SessionId::new(3),
                    success: true,
                },
            )
            .unwrap();

        assert_eq!(source.state(), CopyPasteState::Ready);
        assert!(source.session().is_none());
        assert!(harness.registry.is_empty());
        assert!(!staging.exists());
        assert!(dest.join("three.txt").is_file());

        let events = harness.ui.events.lock();
        match &events.last().unwrap().1 {
            SessionNotification::TransferFinished { success, paths } => {
                assert!(*success);
                assert_eq!(paths.len(), 3);
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[test]
    fn test_request_files_without_files_resets() {
        let mut harness = Harness::new();
        let mut source = CopyPasteSource::new(harness.ctx.clone());
        source
            .handle_rpc(
                &mut harness.registry,
                RpcEvent::ClipboardReceived {
                    session: SessionId::new(1),
                    payload: text_payload("hello"),
                },
            )
            .unwrap();

        source
            .handle_ui(
                &mut harness.registry,
                UiEvent::RequestFiles {
                    dest_dir: PathBuf::from("/tmp"),
                },
            )
            .unwrap();

        assert_eq!(source.state(), CopyPasteState::Ready);
        assert!(source.session().is_none());
        assert!(harness.rpc.sent.lock().is_empty());
        assert_eq!(harness.staged_dirs(), 0);
    }

    #[test]
    fn test_send_failure_removes_staging() {
        let mut harness = Harness::new();
        let mut source = received(&mut harness, 2);
        harness.rpc.fail.store(true, Ordering::SeqCst);

        source
            .handle_ui(
                &mut harness.registry,
                UiEvent::RequestFiles {
                    dest_dir: PathBuf::from("/tmp"),
                },
            )
            .unwrap();

        assert_eq!(source.state(), CopyPasteState::Ready);
        assert_eq!(harness.staged_dirs(), 0);
        assert_eq!(harness.ctx.staging.live_count(), 0);
    }

    #[test]
    fn test_staging_create_failure_keeps_state() {
        let mut harness = Harness::new();
        std::fs::write(harness.ctx.staging.root(), b"not a dir").unwrap();
        let mut source = received(&mut harness, 2);

        let result = source.handle_ui(
            &mut harness.registry,
            UiEvent::RequestFiles {
                dest_dir: PathBuf::from("/tmp"),
            },
        );

        assert!(result.is_err());
        assert_eq!(source.state(), CopyPasteState::Ready);
        assert_eq!(source.session(), SessionId::new(2));
        assert!(harness.rpc.sent.lock().is_empty());
    }

    #[test]
    fn test_new_clipboard_rebinds() {
        let mut harness = Harness::new();
        let mut source = received(&mut harness, 1);
        source
            .handle_rpc(
                &mut harness.registry,
                RpcEvent::ClipboardReceived {
                    session: SessionId::new(2),
                    payload: text_payload("newer"),
                },
            )
            .unwrap();

        assert_eq!(source.session(), SessionId::new(2));
        assert_eq!(harness.registry.lookup(SessionId::new(1)), None);
        assert_eq!(source.snapshot().get_item(Format::Text), Some(&b"newer"[..]));
    }

    #[test]
    fn test_cancel_in_flight() {
        let mut harness = Harness::new();
        let mut source = received(&mut harness, 5);
        source
            .handle_ui(
                &mut harness.registry,
                UiEvent::RequestFiles {
                    dest_dir: PathBuf::from("/tmp"),
                },
            )
            .unwrap();

        source
            .handle_rpc(
                &mut harness.registry,
                RpcEvent::Cancel {
                    session: SessionId::new(5),
                },
            )
            .unwrap();

        assert_eq!(source.state(), CopyPasteState::Ready);
        assert_eq!(harness.staged_dirs(), 0);
        assert_eq!(harness.ui.names().last(), Some(&"cancelled"));
    }
}
