//! Clipboard payload container
//!
//! A payload holds at most one opaque buffer per [`Format`]. Setting a format
//! that is already present replaces its buffer; copying produces an
//! independent deep copy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::Result;

/// Clipboard item format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Plain UTF-8 text
    Text,
    /// Rich text (RTF)
    RichText,
    /// Serialized [`FileList`](super::file_list::FileList)
    FileList,
    /// Raw file contents
    FileContents,
}

impl Format {
    /// All formats in a stable order
    pub const ALL: [Format; 4] = [
        Format::Text,
        Format::RichText,
        Format::FileList,
        Format::FileContents,
    ];
}

/// Typed clipboard container
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    items: HashMap<Format, Vec<u8>>,
}

impl ClipboardPayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all items
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Set the buffer for `format`, replacing any existing item
    pub fn set_item(&mut self, format: Format, data: impl Into<Vec<u8>>) {
        self.items.insert(format, data.into());
    }

    /// Remove a single item, returning its buffer
    pub fn remove_item(&mut self, format: Format) -> Option<Vec<u8>> {
        self.items.remove(&format)
    }

    /// Borrow the buffer for `format`
    pub fn get_item(&self, format: Format) -> Option<&[u8]> {
        self.items.get(&format).map(Vec::as_slice)
    }

    pub fn item_exists(&self, format: Format) -> bool {
        self.items.contains_key(&format)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Formats currently present, in [`Format::ALL`] order
    pub fn formats(&self) -> Vec<Format> {
        Format::ALL.into_iter().filter(|f| self.item_exists(*f)).collect()
    }

    /// Sum of all item sizes in bytes
    pub fn total_size(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// Replace every item with a deep copy of `other`'s items.
    ///
    /// The copy is built off to the side with fallible reservation and only
    /// swapped in once complete, so an allocation failure leaves `self`
    /// unchanged.
    pub fn copy_from(&mut self, other: &ClipboardPayload) -> Result<()> {
        let mut items = HashMap::new();
        items.try_reserve(other.items.len())?;

        for (format, data) in &other.items {
            let mut buf = Vec::new();
            buf.try_reserve_exact(data.len())?;
            buf.extend_from_slice(data);
            items.insert(*format, buf);
        }

        self.items = items;
        Ok(())
    }
}

impl std::fmt::Debug for ClipboardPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for format in self.formats() {
            let len = self.items.get(&format).map_or(0, Vec::len);
            map.entry(&format, &format_args!("{} bytes", len));
        }
        map.finish()
    }
}
