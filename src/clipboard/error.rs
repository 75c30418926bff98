//! Transfer Engine Error Types
//!
//! Error handling for payloads, the file list codec, staging directories and
//! the session state machines, plus the classification that decides how a
//! failure is recovered.

use std::collections::TryReserveError;
use thiserror::Error;

use crate::session::{SessionId, SessionRole};

/// Result type for transfer engine operations
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Transfer engine error types
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// Event not valid for the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Event references a session other than the bound one
    #[error("Session mismatch: expected {expected}, got {actual}")]
    SessionMismatch {
        /// Currently bound session
        expected: SessionId,
        /// Session carried by the event
        actual: SessionId,
    },

    /// Session id 0 or an id already bound to another role
    #[error("Invalid session id {0}")]
    InvalidSessionId(SessionId),

    /// Session id already held by a different role
    #[error("Session {id} already bound to {role:?}")]
    SessionInUse {
        /// Session id
        id: SessionId,
        /// Role holding it
        role: SessionRole,
    },

    /// Relative or absolute path rejected by validation
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Incremental edit on a list reconstructed from received bytes
    #[error("File list was received from the peer and cannot be modified")]
    ReceivedListImmutable,

    /// Attribute record supplied with no file left to attach it to
    #[error("No file entry left to attach attributes to")]
    AttributesWithoutFile,

    /// Stream larger than its length header can describe
    #[error("{stream} stream length {len} exceeds maximum {max}")]
    StreamTooLarge {
        /// Stream name
        stream: &'static str,
        /// Actual length in bytes
        len: usize,
        /// Maximum representable length
        max: usize,
    },

    /// Malformed wire data
    #[error("Invalid data structure: {0}")]
    InvalidData(String),

    /// Path not representable in the requested encoding
    #[error("Path encoding failed: {0}")]
    Encoding(String),

    /// Payload exceeds the configured size limit
    #[error("Data size {0} exceeds maximum allowed {1}")]
    DataSizeExceeded(usize, usize),

    /// Staging directory could not be created
    #[error("Staging directory creation failed: {0}")]
    StagingCreate(String),

    /// Staging directory could not be removed
    #[error("Staging directory removal failed: {0}")]
    StagingDelete(String),

    /// Buffer reservation failed
    #[error("Allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// RPC collaborator refused a command
    #[error("RPC send failed: {0}")]
    RpcSend(&'static str),

    /// Event queue closed
    #[error("Channel send error")]
    ChannelSend,

    /// Event queue closed on the receiving side
    #[error("Channel receive error")]
    ChannelReceive,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classification for recovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Event/state or session id problems
    Protocol,
    /// Filesystem resources (staging, block)
    Resource,
    /// Path or payload encoding problems
    Encoding,
    /// RPC or event queue problems
    Communication,
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &ClipboardError) -> ErrorType {
    match error {
        ClipboardError::InvalidState(_)
        | ClipboardError::SessionMismatch { .. }
        | ClipboardError::InvalidSessionId(_)
        | ClipboardError::SessionInUse { .. }
        | ClipboardError::ReceivedListImmutable
        | ClipboardError::AttributesWithoutFile
        | ClipboardError::DataSizeExceeded(_, _) => ErrorType::Protocol,

        ClipboardError::StagingCreate(_)
        | ClipboardError::StagingDelete(_)
        | ClipboardError::Io(_) => ErrorType::Resource,

        ClipboardError::InvalidPath(_)
        | ClipboardError::StreamTooLarge { .. }
        | ClipboardError::InvalidData(_)
        | ClipboardError::Encoding(_)
        | ClipboardError::Allocation(_) => ErrorType::Encoding,

        ClipboardError::RpcSend(_)
        | ClipboardError::ChannelSend
        | ClipboardError::ChannelReceive => ErrorType::Communication,
    }
}

/// Recovery action to take after error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Reset the session to Ready and release everything it holds
    ResetSession,

    /// Abort before anything became visible to the host; no state change
    AbortTransfer,

    /// Drop the offending entry from the stream being built
    SkipEntry,

    /// Log and continue (cleanup already attempted)
    LogOnly,

    /// Fail and propagate error
    Fail,
}

/// Determine recovery action for error
pub fn recovery_action(error: &ClipboardError) -> RecoveryAction {
    match classify_error(error) {
        ErrorType::Protocol => RecoveryAction::ResetSession,

        ErrorType::Resource => match error {
            ClipboardError::StagingDelete(_) => RecoveryAction::LogOnly,
            _ => RecoveryAction::AbortTransfer,
        },

        ErrorType::Encoding => match error {
            ClipboardError::Encoding(_) => RecoveryAction::SkipEntry,
            _ => RecoveryAction::Fail,
        },

        ErrorType::Communication => match error {
            ClipboardError::RpcSend(_) => RecoveryAction::ResetSession,
            _ => RecoveryAction::Fail,
        },
    }
}
