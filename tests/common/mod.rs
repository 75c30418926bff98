//! Shared fixtures for the integration tests

#![allow(dead_code)]

use mockall::mock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use lamco_dnd_session::clipboard::{ClipboardPayload, FileAttributes, FileList, Format};
use lamco_dnd_session::config::TransferConfig;
use lamco_dnd_session::session::{
    RpcCommand, RpcSink, SessionContext, SessionId, SessionNotification, SessionRole, UiSink,
};
use lamco_dnd_session::staging::{BlockControl, NoBlockControl, StagingManager};
use lamco_dnd_session::SessionEngine;

mock! {
    pub Block {}

    impl BlockControl for Block {
        fn block(&self, path: &Path) -> bool;
        fn unblock(&self, path: &Path);
    }
}

#[derive(Default)]
pub struct RecordingRpc {
    pub sent: Mutex<Vec<(SessionId, RpcCommand)>>,
    pub fail: AtomicBool,
}

impl RecordingRpc {
    pub fn names(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(|(_, c)| c.name()).collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl RpcSink for RecordingRpc {
    fn send(&self, session: SessionId, command: &RpcCommand) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push((session, command.clone()));
        true
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub events: Mutex<Vec<(SessionRole, SessionNotification)>>,
}

impl RecordingUi {
    pub fn last(&self) -> Option<SessionNotification> {
        self.events.lock().last().map(|(_, e)| e.clone())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|(_, e)| e.name()).collect()
    }
}

impl UiSink for RecordingUi {
    fn on_session_event(&self, role: SessionRole, event: &SessionNotification) {
        // staged paths only exist during the callback
        if let SessionNotification::TransferFinished { success: true, paths } = event {
            for path in paths {
                assert!(path.exists(), "{} missing during callback", path.display());
            }
        }
        self.events.lock().push((role, event.clone()));
    }
}

pub struct Fixture {
    pub temp: TempDir,
    pub rpc: Arc<RecordingRpc>,
    pub ui: Arc<RecordingUi>,
    pub staging: StagingManager,
    pub engine: SessionEngine,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_block(Arc::new(NoBlockControl))
    }

    pub fn with_block(block: Arc<dyn BlockControl>) -> Self {
        let temp = TempDir::new().unwrap();
        let rpc = Arc::new(RecordingRpc::default());
        let ui = Arc::new(RecordingUi::default());
        let staging = StagingManager::new(temp.path().join("stage"), block);
        let ctx = SessionContext::new(
            rpc.clone(),
            ui.clone(),
            staging.clone(),
            TransferConfig::default(),
        );

        Self {
            temp,
            rpc,
            ui,
            engine: SessionEngine::new(ctx),
            staging,
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(
            self.rpc.clone(),
            self.ui.clone(),
            self.staging.clone(),
            TransferConfig::default(),
        )
    }

    /// Directories currently present under the staging root
    pub fn staged_dirs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.staging.root()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn assert_clean(&self) {
        assert!(self.staged_dirs().is_empty(), "leftover {:?}", self.staged_dirs());
        assert_eq!(self.staging.live_count(), 0);
        assert!(self.engine.registry().is_empty());
    }
}

/// Three regular files totalling 4096 bytes
pub fn three_file_payload() -> ClipboardPayload {
    let mut list = FileList::new();
    for (name, size) in [("report.pdf", 2048), ("notes.txt", 1024), ("image.png", 1024)] {
        list.add_file(name, None).unwrap();
        list.add_file_attributes(FileAttributes::regular(size)).unwrap();
    }
    assert_eq!(list.total_size(), 4096);

    let mut payload = ClipboardPayload::new();
    payload.set_item(Format::FileList, list.to_bytes(false).unwrap().to_vec());
    payload
}

pub fn text_payload(text: &str) -> ClipboardPayload {
    let mut payload = ClipboardPayload::new();
    payload.set_item(Format::Text, text.as_bytes().to_vec());
    payload
}
