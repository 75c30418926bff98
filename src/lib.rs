//! # lamco-dnd-session
//!
//! Guest-side clipboard and drag-and-drop transfer session engine.
//!
//! A guest VM and its host exchange clipboard contents and drag payloads
//! (text, rich text, file lists) over an asynchronous, session-oriented RPC
//! channel. This crate is the part in the middle: the file list codec, the
//! staging directory lifecycle, and the per-role state machines that turn an
//! unordered event stream into exactly-once side effects.
//!
//! # Architecture
//!
//! ```text
//! lamco-dnd-session
//!   ├─> clipboard   payload container, file list codec, path encodings
//!   ├─> staging     per-transfer directories + vmblock guard
//!   ├─> session     registry and role state machines
//!   ├─> manager     single-task event queue (DndManager)
//!   ├─> replay      JSON-lines event scripts for the replay binary
//!   └─> config      TOML configuration
//! ```
//!
//! # Data Flow
//!
//! **Outbound:** UI → state machine → staging + codec → payload → RPC → host
//!
//! **Inbound:** RPC → registry (fencing) → state machine → UI

#![warn(clippy::all)]

/// Engine configuration
pub mod config;

/// Payloads, file list codec and error types
pub mod clipboard;

/// Staging directories and filesystem blocking
pub mod staging;

/// Session registry and role state machines
pub mod session;

/// Event queue driving the state machines
pub mod manager;

/// Scripted event replay
pub mod replay;

pub use clipboard::{ClipboardError, ClipboardPayload, FileList, Format, Result};
pub use manager::{DndManager, EngineStats, SessionEngine, SessionEvent};
pub use session::{RpcEvent, SessionId, SessionRole, UiEvent};
