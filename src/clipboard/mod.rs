//! Clipboard Data Model
//!
//! Typed clipboard payloads and the binary file list codec exchanged with the
//! host.
//!
//! # Architecture
//!
//! ```text
//! ClipboardPayload
//!   ├─> Text / RichText / FileContents   opaque bytes
//!   └─> FileList                         FileList::to_bytes / from_bytes
//!                                          ├─> relative paths
//!                                          ├─> full paths (local | cp name)
//!                                          ├─> attribute records
//!                                          └─> file:// URIs
//! ```

pub mod error;
pub mod file_list;
pub mod path;
pub mod payload;

pub use error::{classify_error, recovery_action, ClipboardError, ErrorType, RecoveryAction, Result};
pub use file_list::{FileAttributes, FileEntry, FileKind, FileList};
pub use payload::{ClipboardPayload, Format};
