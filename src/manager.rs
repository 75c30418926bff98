//! Transfer Engine Manager
//!
//! Serializes RPC and UI events onto a single queue and drives the three role
//! machines from one task. All state mutation happens inside that task.
//!
//! # Event Routing
//!
//! ```text
//!  hostClipboardReceived ───────────────────────> CopyPasteSource
//!  dragBegin ───────────────────────────────────> DragSource
//!  dragEnterReply ──> only while EnterPending ──> DragDestination
//!  other RpcEvent ──> registry.lookup(id) ──┬───> owning machine
//!                                           └───> dropped (stale id)
//!  UiEvent ──> UiEvent::role() ─────────────────> owning machine
//! ```

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::clipboard::error::{classify_error, recovery_action, ClipboardError, Result};
use crate::session::{
    CopyPasteSource, DragDestination, DragDestinationState, DragSource, RpcEvent, SessionContext,
    SessionMachine, SessionRegistry, SessionRole, UiEvent,
};

/// Event accepted by the engine queue
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Rpc(RpcEvent),
    Ui(UiEvent),
}

impl From<RpcEvent> for SessionEvent {
    fn from(event: RpcEvent) -> Self {
        SessionEvent::Rpc(event)
    }
}

impl From<UiEvent> for SessionEvent {
    fn from(event: UiEvent) -> Self {
        SessionEvent::Ui(event)
    }
}

/// Counters reported when the engine stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub rpc_events: u64,
    pub ui_events: u64,
    /// RPC events dropped because their session id was not bound
    pub fenced: u64,
    /// Events whose handling returned an error
    pub errors: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Registry plus the three role machines
pub struct SessionEngine {
    registry: SessionRegistry,
    copy_paste: CopyPasteSource,
    drag_source: DragSource,
    drag_dest: DragDestination,
    stats: EngineStats,
}

impl SessionEngine {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            registry: SessionRegistry::new(),
            copy_paste: CopyPasteSource::new(ctx.clone()),
            drag_source: DragSource::new(ctx.clone()),
            drag_dest: DragDestination::new(ctx),
            stats: EngineStats::default(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn copy_paste(&self) -> &CopyPasteSource {
        &self.copy_paste
    }

    pub fn drag_source(&self) -> &DragSource {
        &self.drag_source
    }

    pub fn drag_dest(&self) -> &DragDestination {
        &self.drag_dest
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    fn split(&mut self, role: SessionRole) -> (&mut SessionRegistry, &mut dyn SessionMachine) {
        let machine: &mut dyn SessionMachine = match role {
            SessionRole::SourceCopyPaste => &mut self.copy_paste,
            SessionRole::SourceDragDrop => &mut self.drag_source,
            SessionRole::DestinationDragDrop => &mut self.drag_dest,
        };
        (&mut self.registry, machine)
    }

    /// Route one event to its machine
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<()> {
        let result = match event {
            SessionEvent::Rpc(event) => {
                self.stats.rpc_events += 1;
                self.dispatch_rpc(event)
            }
            SessionEvent::Ui(event) => {
                self.stats.ui_events += 1;
                let role = event.role();
                debug!("UI {:?} -> {:?}", event, role);
                let (registry, machine) = self.split(role);
                machine.handle_ui(registry, event)
            }
        };

        if let Err(e) = &result {
            self.stats.errors += 1;
            debug!(
                "Event failed ({:?}, recovery {:?}): {}",
                classify_error(e),
                recovery_action(e),
                e
            );
        }
        result
    }

    fn dispatch_rpc(&mut self, event: RpcEvent) -> Result<()> {
        let role = match &event {
            RpcEvent::ClipboardReceived { .. } => SessionRole::SourceCopyPaste,
            RpcEvent::DragBegin { .. } => SessionRole::SourceDragDrop,
            // the reply carries the id the host assigns; only a pending enter takes it
            RpcEvent::DragEnterReply { .. } => {
                if self.drag_dest.state() != DragDestinationState::EnterPending {
                    self.stats.fenced += 1;
                    debug!("Dropping {:?}: no drag enter pending", event);
                    return Ok(());
                }
                SessionRole::DestinationDragDrop
            }
            other => match self.registry.lookup(other.session()) {
                Some(role) => role,
                None => {
                    self.stats.fenced += 1;
                    debug!("Dropping {:?}: session {} not bound", other, other.session());
                    return Ok(());
                }
            },
        };

        debug!("RPC {:?} -> {:?}", event, role);
        let (registry, machine) = self.split(role);
        machine.handle_rpc(registry, event)
    }

    /// Reset every machine that is not idle
    pub fn shutdown(&mut self) {
        for role in [
            SessionRole::SourceCopyPaste,
            SessionRole::SourceDragDrop,
            SessionRole::DestinationDragDrop,
        ] {
            let (registry, machine) = self.split(role);
            if !machine.is_ready() || !machine.session().is_none() {
                machine.reset(registry, "engine shutdown");
            }
        }
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("copy_paste", &self.copy_paste)
            .field("drag_source", &self.drag_source)
            .field("drag_dest", &self.drag_dest)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Owns the event processor task
pub struct DndManager {
    event_tx: mpsc::Sender<SessionEvent>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<EngineStats>>,
}

impl DndManager {
    /// Spawn the event processor; must be called inside a tokio runtime
    pub fn new(ctx: SessionContext) -> Self {
        let depth = ctx.transfer.event_queue_depth.max(1);
        let (event_tx, event_rx) = mpsc::channel(depth);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let engine = SessionEngine::new(ctx);
        let task = tokio::spawn(Self::run(engine, event_rx, shutdown_rx));

        info!("Transfer engine started (queue depth {})", depth);
        Self {
            event_tx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Sender for RPC and UI integrations
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    pub async fn send(&self, event: impl Into<SessionEvent>) -> Result<()> {
        self.event_tx
            .send(event.into())
            .await
            .map_err(|_| ClipboardError::ChannelSend)
    }

    async fn run(
        mut engine: SessionEngine,
        mut event_rx: mpsc::Receiver<SessionEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> EngineStats {
        loop {
            tokio::select! {
                biased;

                event = event_rx.recv() => match event {
                    Some(event) => Self::handle(&mut engine, event),
                    None => {
                        debug!("Event queue closed");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!("Transfer engine shutting down");
                    while let Ok(event) = event_rx.try_recv() {
                        Self::handle(&mut engine, event);
                    }
                    break;
                }
            }
        }

        engine.shutdown();
        engine.stats()
    }

    fn handle(engine: &mut SessionEngine, event: SessionEvent) {
        if let Err(e) = engine.dispatch(event) {
            error!("Error handling session event: {}", e);
        }
    }

    /// Stop the processor after draining queued events
    pub async fn shutdown(mut self) -> Result<EngineStats> {
        info!("Shutting down transfer engine");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match self.task.take() {
            Some(task) => task.await.map_err(|_| ClipboardError::ChannelReceive),
            None => Ok(EngineStats::default()),
        }
    }
}

impl std::fmt::Debug for DndManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DndManager")
            .field("running", &self.task.is_some())
            .finish()
    }
}
