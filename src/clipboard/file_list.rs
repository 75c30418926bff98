//! File list codec
//!
//! Serializes the ordered list of files carried in a [`Format::FileList`]
//! payload item.
//!
//! # Wire Layout
//!
//! ```text
//! +0   u64  total size of regular files (0 = unknown)
//! +8   u32  flags (bit 0: full paths in local form)
//! +12  u32  relative-path stream length
//! +16  u32  full-path stream length
//! +20  u32  attribute stream length
//! +24  u32  URI stream length
//! +28  relative paths, NUL-terminated
//!      full paths, local: NUL-terminated / cross-platform: u32 len + cp name
//!      attribute records, 56 bytes each
//!      file:// URIs of top-level entries, NUL-terminated
//! ```
//!
//! All integers are little-endian. Bytes past the last stream are ignored.
//!
//! A list is either built incrementally by the sending side or reconstructed
//! from received bytes, never both. Received lists keep the raw full-path
//! stream and reject further edits.
//!
//! [`Format::FileList`]: super::payload::Format::FileList

use bytes::{Buf, BufMut, Bytes};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::error::{ClipboardError, Result};
use super::path::{file_uri, from_cp_name, is_top_level, normalize_relative, to_cp_name};

/// Header size in bytes
pub const HEADER_SIZE: usize = 28;

/// Attribute record size in bytes
pub const ATTRIBUTE_RECORD_SIZE: usize = 56;

/// Header flag: full-path stream uses the local form
pub const FLAG_LOCAL_FULL_PATHS: u32 = 0x01;

/// Largest stream a length header can describe
pub const MAX_STREAM_LEN: usize = u32::MAX as usize;

/// Attribute validity bits
pub mod valid {
    pub const PERMISSIONS: u32 = 0x01;
    pub const SIZE: u32 = 0x02;
    pub const CREATED: u32 = 0x04;
    pub const ACCESSED: u32 = 0x08;
    pub const WRITTEN: u32 = 0x10;
    pub const CHANGED: u32 = 0x20;
}

// =============================================================================
// Entries
// =============================================================================

/// Kind of a file list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    Regular,
    Directory,
    /// Only ever received; the encoder refuses to produce it
    Symlink,
}

impl FileKind {
    fn to_wire(self) -> u8 {
        match self {
            FileKind::Regular => 0,
            FileKind::Directory => 1,
            FileKind::Symlink => 2,
        }
    }

    fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FileKind::Regular),
            1 => Ok(FileKind::Directory),
            2 => Ok(FileKind::Symlink),
            other => Err(ClipboardError::InvalidData(format!("unknown file kind {}", other))),
        }
    }
}

/// Per-file attributes; every field except `kind` may be unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttributes {
    pub kind: FileKind,
    pub permissions: Option<u32>,
    pub size: Option<u64>,
    /// Timestamps in nanoseconds since the Unix epoch
    pub created: Option<i64>,
    pub accessed: Option<i64>,
    pub written: Option<i64>,
    pub changed: Option<i64>,
}

impl FileAttributes {
    /// Regular file of known size
    pub fn regular(size: u64) -> Self {
        Self {
            kind: FileKind::Regular,
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            ..Self::default()
        }
    }

    /// Capture attributes from filesystem metadata
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let kind = if meta.is_dir() {
            FileKind::Directory
        } else if meta.file_type().is_symlink() {
            FileKind::Symlink
        } else {
            FileKind::Regular
        };

        Self {
            kind,
            permissions: Some(meta.mode() & 0o7777),
            size: (kind == FileKind::Regular).then(|| meta.len()),
            created: meta.created().ok().and_then(system_time_nanos),
            accessed: Some(unix_nanos(meta.atime(), meta.atime_nsec())),
            written: Some(unix_nanos(meta.mtime(), meta.mtime_nsec())),
            changed: Some(unix_nanos(meta.ctime(), meta.ctime_nsec())),
        }
    }

    /// Validity bitmask for the fields that are known
    pub fn mask(&self) -> u32 {
        let mut mask = 0;
        if self.permissions.is_some() {
            mask |= valid::PERMISSIONS;
        }
        if self.size.is_some() {
            mask |= valid::SIZE;
        }
        if self.created.is_some() {
            mask |= valid::CREATED;
        }
        if self.accessed.is_some() {
            mask |= valid::ACCESSED;
        }
        if self.written.is_some() {
            mask |= valid::WRITTEN;
        }
        if self.changed.is_some() {
            mask |= valid::CHANGED;
        }
        mask
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.kind.to_wire());
        buf.put_bytes(0, 3);
        buf.put_u32_le(self.mask());
        buf.put_u32_le(self.permissions.unwrap_or(0));
        buf.put_bytes(0, 4);
        buf.put_u64_le(self.size.unwrap_or(0));
        buf.put_i64_le(self.created.unwrap_or(0));
        buf.put_i64_le(self.accessed.unwrap_or(0));
        buf.put_i64_le(self.written.unwrap_or(0));
        buf.put_i64_le(self.changed.unwrap_or(0));
    }

    fn decode(mut record: &[u8]) -> Result<Self> {
        if record.len() < ATTRIBUTE_RECORD_SIZE {
            return Err(ClipboardError::InvalidData(format!(
                "attribute record too short: {} bytes",
                record.len()
            )));
        }

        let kind = FileKind::from_wire(record.get_u8())?;
        record.advance(3);
        let mask = record.get_u32_le();
        let permissions = record.get_u32_le();
        record.advance(4);
        let size = record.get_u64_le();
        let created = record.get_i64_le();
        let accessed = record.get_i64_le();
        let written = record.get_i64_le();
        let changed = record.get_i64_le();

        let when = |bit: u32, value: i64| (mask & bit != 0).then_some(value);
        Ok(Self {
            kind,
            permissions: (mask & valid::PERMISSIONS != 0).then_some(permissions),
            size: (mask & valid::SIZE != 0).then_some(size),
            created: when(valid::CREATED, created),
            accessed: when(valid::ACCESSED, accessed),
            written: when(valid::WRITTEN, written),
            changed: when(valid::CHANGED, changed),
        })
    }
}

fn unix_nanos(secs: i64, nsecs: i64) -> i64 {
    secs.saturating_mul(1_000_000_000).saturating_add(nsecs)
}

fn system_time_nanos(time: SystemTime) -> Option<i64> {
    let since = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_nanos()).ok()
}

/// One entry of a file list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Normalized relative path
    pub relative_path: String,
    /// Absolute guest path; only set on lists built locally
    pub full_path: Option<PathBuf>,
    pub attributes: FileAttributes,
}

impl FileEntry {
    pub fn is_top_level(&self) -> bool {
        is_top_level(&self.relative_path)
    }
}

// =============================================================================
// File List
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Built {
        entries: Vec<FileEntry>,
        /// Entries that already received an attribute record
        attributed: usize,
    },
    Received {
        entries: Vec<FileEntry>,
        raw_full_paths: Bytes,
        local: bool,
        uris: Vec<String>,
    },
}

/// Ordered list of files with aggregate size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    repr: Repr,
    total_size: u64,
}

impl Default for FileList {
    fn default() -> Self {
        Self::new()
    }
}

impl FileList {
    /// Empty list ready for incremental building
    pub fn new() -> Self {
        Self {
            repr: Repr::Built {
                entries: Vec::new(),
                attributed: 0,
            },
            total_size: 0,
        }
    }

    /// Append one entry.
    ///
    /// A trailing separator on `relative` marks a directory.
    pub fn add_file(&mut self, relative: &str, full_path: Option<&Path>) -> Result<()> {
        let entry = Self::make_entry(relative, full_path)?;
        self.built_entries_mut()?.push(entry);
        Ok(())
    }

    /// Append several entries; nothing is added if any entry is invalid
    pub fn add_files<'a, I>(&mut self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Path>)>,
    {
        let new_entries = files
            .into_iter()
            .map(|(relative, full)| Self::make_entry(relative, full))
            .collect::<Result<Vec<_>>>()?;

        let entries = self.built_entries_mut()?;
        entries.try_reserve(new_entries.len())?;
        entries.extend(new_entries);
        Ok(())
    }

    /// Attach attributes to the next entry that has none yet
    pub fn add_file_attributes(&mut self, attributes: FileAttributes) -> Result<()> {
        if attributes.kind == FileKind::Symlink {
            return Err(ClipboardError::InvalidData(
                "symlink entries are never sent".to_string(),
            ));
        }

        let Repr::Built { entries, attributed } = &mut self.repr else {
            return Err(ClipboardError::ReceivedListImmutable);
        };

        let entry = entries
            .get_mut(*attributed)
            .ok_or(ClipboardError::AttributesWithoutFile)?;
        entry.attributes = attributes;
        *attributed += 1;

        if attributes.kind == FileKind::Regular {
            if let Some(size) = attributes.size {
                self.total_size = self.total_size.saturating_add(size);
            }
        }
        Ok(())
    }

    fn make_entry(relative: &str, full_path: Option<&Path>) -> Result<FileEntry> {
        let is_dir = relative.ends_with('/') || relative.ends_with('\\');
        let relative_path = normalize_relative(relative)?;

        if let Some(full) = full_path {
            if !full.is_absolute() {
                return Err(ClipboardError::InvalidPath(format!(
                    "full path is not absolute: {}",
                    full.display()
                )));
            }
        }

        Ok(FileEntry {
            relative_path,
            full_path: full_path.map(Path::to_path_buf),
            attributes: if is_dir {
                FileAttributes::directory()
            } else {
                FileAttributes::default()
            },
        })
    }

    fn built_entries_mut(&mut self) -> Result<&mut Vec<FileEntry>> {
        match &mut self.repr {
            Repr::Built { entries, .. } => Ok(entries),
            Repr::Received { .. } => Err(ClipboardError::ReceivedListImmutable),
        }
    }

    /// Build a list from local files and directory trees.
    ///
    /// Directories precede their contents, symlinks are skipped, attributes
    /// come from filesystem metadata.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut list = Self::new();

        for root in paths {
            let root = root.as_ref();
            let meta = std::fs::symlink_metadata(root)?;
            if meta.file_type().is_symlink() {
                debug!("Skipping symlink {}", root.display());
                continue;
            }

            let name = root
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    ClipboardError::InvalidPath(format!("no usable name: {}", root.display()))
                })?
                .to_string();

            if !meta.is_dir() {
                list.add_file(&name, Some(root))?;
                list.add_file_attributes(FileAttributes::from_metadata(&meta))?;
                continue;
            }

            for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(|e| ClipboardError::Io(e.into()))?;
                if entry.file_type().is_symlink() {
                    debug!("Skipping symlink {}", entry.path().display());
                    continue;
                }

                let suffix = entry
                    .path()
                    .strip_prefix(root)
                    .map_err(|_| ClipboardError::InvalidPath(entry.path().display().to_string()))?;
                let suffix = suffix.to_str().ok_or_else(|| {
                    ClipboardError::InvalidPath(format!(
                        "non UTF-8 path {}",
                        entry.path().display()
                    ))
                })?;

                let relative = if suffix.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", name, suffix)
                };

                list.add_file(&relative, Some(entry.path()))?;
                list.add_file_attributes(FileAttributes::from_metadata(&entry.metadata().map_err(
                    |e| ClipboardError::Io(e.into()),
                )?))?;
            }
        }

        Ok(list)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn entries(&self) -> &[FileEntry] {
        match &self.repr {
            Repr::Built { entries, .. } | Repr::Received { entries, .. } => entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Sum of regular file sizes, 0 if unknown
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn is_received(&self) -> bool {
        matches!(self.repr, Repr::Received { .. })
    }

    pub fn relative_paths(&self) -> Vec<&str> {
        self.entries().iter().map(|e| e.relative_path.as_str()).collect()
    }

    /// Absolute guest paths carried by the list.
    ///
    /// Received cross-platform names that fail to decode are skipped.
    pub fn full_paths(&self) -> Result<Vec<PathBuf>> {
        match &self.repr {
            Repr::Built { entries, .. } => {
                Ok(entries.iter().filter_map(|e| e.full_path.clone()).collect())
            }
            Repr::Received {
                raw_full_paths, local, ..
            } => decode_full_paths(raw_full_paths, *local),
        }
    }

    /// `file://` URIs of top-level entries
    pub fn uri_list(&self) -> Vec<String> {
        match &self.repr {
            Repr::Built { entries, .. } => entries
                .iter()
                .filter(|e| e.is_top_level())
                .filter_map(|e| e.full_path.as_deref())
                .filter_map(|p| match file_uri(p) {
                    Ok(uri) => Some(uri),
                    Err(e) => {
                        warn!("Skipping URI for {}: {}", p.display(), e);
                        None
                    }
                })
                .collect(),
            Repr::Received { uris, .. } => uris.clone(),
        }
    }

    /// Where top-level entries land once transferred into `root`
    pub fn staged_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.entries()
            .iter()
            .filter(|e| e.is_top_level())
            .map(|e| root.join(&e.relative_path))
            .collect()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Serialize the list.
    ///
    /// `local` selects the full-path form. Entries whose full path cannot be
    /// expressed are left out of the full-path and URI streams only.
    pub fn to_bytes(&self, local: bool) -> Result<Bytes> {
        let entries = self.entries();

        let mut rel = Vec::new();
        for entry in entries {
            rel.try_reserve(entry.relative_path.len() + 1)?;
            rel.put_slice(entry.relative_path.as_bytes());
            rel.put_u8(0);
        }

        let full = match &self.repr {
            Repr::Received {
                raw_full_paths,
                local: received_local,
                ..
            } if *received_local == local => raw_full_paths.to_vec(),
            Repr::Received { .. } => encode_full_paths(&self.full_paths()?, local)?,
            Repr::Built { entries, .. } => {
                let paths: Vec<PathBuf> =
                    entries.iter().filter_map(|e| e.full_path.clone()).collect();
                encode_full_paths(&paths, local)?
            }
        };

        let mut attrs = Vec::new();
        attrs.try_reserve_exact(entries.len().saturating_mul(ATTRIBUTE_RECORD_SIZE))?;
        for entry in entries {
            entry.attributes.encode(&mut attrs);
        }

        let mut uris = Vec::new();
        for uri in self.uri_list() {
            uris.try_reserve(uri.len() + 1)?;
            uris.put_slice(uri.as_bytes());
            uris.put_u8(0);
        }

        check_stream_len("relative path", rel.len(), MAX_STREAM_LEN)?;
        check_stream_len("full path", full.len(), MAX_STREAM_LEN)?;
        check_stream_len("attribute", attrs.len(), MAX_STREAM_LEN)?;
        check_stream_len("uri", uris.len(), MAX_STREAM_LEN)?;

        let mut out = Vec::new();
        out.try_reserve_exact(HEADER_SIZE + rel.len() + full.len() + attrs.len() + uris.len())?;
        out.put_u64_le(self.total_size);
        out.put_u32_le(if local { FLAG_LOCAL_FULL_PATHS } else { 0 });
        out.put_u32_le(rel.len() as u32);
        out.put_u32_le(full.len() as u32);
        out.put_u32_le(attrs.len() as u32);
        out.put_u32_le(uris.len() as u32);
        out.put_slice(&rel);
        out.put_slice(&full);
        out.put_slice(&attrs);
        out.put_slice(&uris);

        Ok(Bytes::from(out))
    }

    /// Reconstruct a list from received bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ClipboardError::InvalidData(format!(
                "file list too short: {} bytes",
                data.len()
            )));
        }

        let mut header = &data[..HEADER_SIZE];
        let total_size = header.get_u64_le();
        let flags = header.get_u32_le();
        let lens = [
            header.get_u32_le() as usize,
            header.get_u32_le() as usize,
            header.get_u32_le() as usize,
            header.get_u32_le() as usize,
        ];

        let body = &data[HEADER_SIZE..];
        let declared = lens
            .iter()
            .try_fold(0usize, |acc, len| acc.checked_add(*len))
            .filter(|total| *total <= body.len())
            .ok_or_else(|| {
                ClipboardError::InvalidData(format!(
                    "declared stream lengths {:?} overrun {} byte body",
                    lens,
                    body.len()
                ))
            })?;
        if declared < body.len() {
            debug!("Ignoring {} trailing bytes after file list", body.len() - declared);
        }

        let (rel, rest) = body.split_at(lens[0]);
        let (full, rest) = rest.split_at(lens[1]);
        let (attrs, rest) = rest.split_at(lens[2]);
        let uri_stream = &rest[..lens[3]];

        let mut entries = Vec::new();
        for raw in split_nul_terminated(rel) {
            let text = std::str::from_utf8(raw).map_err(|e| {
                ClipboardError::InvalidData(format!("relative path not UTF-8: {}", e))
            })?;
            entries.push(FileEntry {
                relative_path: normalize_relative(text)?,
                full_path: None,
                attributes: FileAttributes::default(),
            });
        }

        for (entry, record) in entries.iter_mut().zip(attrs.chunks_exact(ATTRIBUTE_RECORD_SIZE)) {
            entry.attributes = FileAttributes::decode(record)?;
        }

        let uris = split_nul_terminated(uri_stream)
            .map(|raw| {
                String::from_utf8(raw.to_vec())
                    .map_err(|e| ClipboardError::InvalidData(format!("URI not UTF-8: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            repr: Repr::Received {
                entries,
                raw_full_paths: Bytes::copy_from_slice(full),
                local: flags & FLAG_LOCAL_FULL_PATHS != 0,
                uris,
            },
            total_size,
        })
    }
}

fn check_stream_len(stream: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(ClipboardError::StreamTooLarge { stream, len, max });
    }
    Ok(())
}

/// Split a stream of NUL-terminated strings; an unterminated tail counts
fn split_nul_terminated(stream: &[u8]) -> impl Iterator<Item = &[u8]> {
    let stream = stream.strip_suffix(&[0]).unwrap_or(stream);
    let empty = stream.is_empty();
    stream.split(|b| *b == 0).filter(move |_| !empty)
}

fn encode_full_paths(paths: &[PathBuf], local: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for path in paths {
        if local {
            let bytes = path.as_os_str().as_bytes();
            if bytes.contains(&0) {
                warn!("Skipping full path with NUL byte: {}", path.display());
                continue;
            }
            out.try_reserve(bytes.len() + 1)?;
            out.put_slice(bytes);
            out.put_u8(0);
        } else {
            let name = match to_cp_name(path) {
                Ok(name) => name,
                Err(e) => {
                    warn!("Skipping full path {}: {}", path.display(), e);
                    continue;
                }
            };
            let len = match u32::try_from(name.len()) {
                Ok(len) => len,
                Err(_) => {
                    warn!("Skipping oversized full path {}", path.display());
                    continue;
                }
            };
            out.try_reserve(name.len() + 4)?;
            out.put_u32_le(len);
            out.put_slice(&name);
        }
    }

    Ok(out)
}

fn decode_full_paths(mut stream: &[u8], local: bool) -> Result<Vec<PathBuf>> {
    if local {
        return Ok(split_nul_terminated(stream)
            .map(|raw| PathBuf::from(std::ffi::OsStr::from_bytes(raw)))
            .collect());
    }

    let mut paths = Vec::new();
    while stream.has_remaining() {
        if stream.remaining() < 4 {
            return Err(ClipboardError::InvalidData("truncated full path length".to_string()));
        }
        let len = stream.get_u32_le() as usize;
        if stream.remaining() < len {
            return Err(ClipboardError::InvalidData(format!(
                "full path of {} bytes overruns stream",
                len
            )));
        }
        let (name, rest) = stream.split_at(len);
        match from_cp_name(name) {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Skipping received full path: {}", e),
        }
        stream = rest;
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_list() -> FileList {
        let mut list = FileList::new();
        list.add_file("a/", Some(Path::new("/src/a"))).unwrap();
        list.add_file_attributes(FileAttributes::directory()).unwrap();
        list.add_file("a/b.txt", Some(Path::new("/src/a/b.txt"))).unwrap();
        list.add_file_attributes(FileAttributes {
            permissions: Some(0o644),
            written: Some(1_700_000_000_000_000_000),
            ..FileAttributes::regular(4096)
        })
        .unwrap();
        list
    }

    #[test]
    fn test_directory_order_preserved() {
        let list = sample_list();
        let decoded = FileList::from_bytes(&list.to_bytes(false).unwrap()).unwrap();

        assert_eq!(decoded.relative_paths(), vec!["a", "a/b.txt"]);
        assert_eq!(decoded.entries()[0].attributes.kind, FileKind::Directory);
        assert_eq!(decoded.entries()[1].attributes.size, Some(4096));
        assert_eq!(decoded.entries()[1].attributes.permissions, Some(0o644));
        assert_eq!(decoded.entries()[1].attributes.created, None);
        assert_eq!(decoded.total_size(), 4096);
    }

    #[test]
    fn test_attribute_masks_roundtrip() {
        let list = sample_list();
        let decoded = FileList::from_bytes(&list.to_bytes(true).unwrap()).unwrap();
        let masks: Vec<u32> = decoded.entries().iter().map(|e| e.attributes.mask()).collect();
        assert_eq!(masks, vec![0, valid::PERMISSIONS | valid::SIZE | valid::WRITTEN]);
    }

    #[test]
    fn test_full_paths_both_forms() {
        let list = sample_list();

        let local = FileList::from_bytes(&list.to_bytes(true).unwrap()).unwrap();
        assert_eq!(
            local.full_paths().unwrap(),
            vec![PathBuf::from("/src/a"), PathBuf::from("/src/a/b.txt")]
        );

        let cross = FileList::from_bytes(&list.to_bytes(false).unwrap()).unwrap();
        assert_eq!(cross.full_paths().unwrap(), local.full_paths().unwrap());
    }

    #[test]
    fn test_uri_only_for_top_level() {
        let list = sample_list();
        assert_eq!(list.uri_list(), vec!["file:///src/a".to_string()]);

        let decoded = FileList::from_bytes(&list.to_bytes(false).unwrap()).unwrap();
        assert_eq!(decoded.uri_list(), vec!["file:///src/a".to_string()]);
    }

    #[test]
    fn test_received_list_rejects_edits() {
        let list = sample_list();
        let mut decoded = FileList::from_bytes(&list.to_bytes(true).unwrap()).unwrap();
        let before = decoded.clone();

        assert!(matches!(
            decoded.add_file("c.txt", None),
            Err(ClipboardError::ReceivedListImmutable)
        ));
        assert!(matches!(
            decoded.add_file_attributes(FileAttributes::regular(1)),
            Err(ClipboardError::ReceivedListImmutable)
        ));
        assert_eq!(decoded, before);
    }

    #[test]
    fn test_attributes_without_file() {
        let mut list = FileList::new();
        assert!(matches!(
            list.add_file_attributes(FileAttributes::regular(1)),
            Err(ClipboardError::AttributesWithoutFile)
        ));
    }

    #[test]
    fn test_add_files_is_all_or_nothing() {
        let mut list = FileList::new();
        let result = list.add_files([("ok.txt", None), ("../escape", None)]);
        assert!(result.is_err());
        assert!(list.is_empty());

        list.add_files([("x", None), ("x/y", None)]).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_symlink_never_encoded() {
        let mut list = FileList::new();
        list.add_file("link", None).unwrap();
        let attrs = FileAttributes {
            kind: FileKind::Symlink,
            ..FileAttributes::default()
        };
        assert!(list.add_file_attributes(attrs).is_err());
    }

    #[test]
    fn test_cp_name_failure_skips_stream_only() {
        let mut list = FileList::new();
        list.add_file("good.txt", Some(Path::new("/tmp/good.txt"))).unwrap();
        list.add_file("bad.txt", Some(Path::new("/tmp/../bad.txt"))).unwrap();

        let decoded = FileList::from_bytes(&list.to_bytes(false).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.full_paths().unwrap(), vec![PathBuf::from("/tmp/good.txt")]);
    }

    #[test]
    fn test_from_bytes_rejects_malformed() {
        assert!(FileList::from_bytes(&[0u8; 10]).is_err());

        let mut data = FileList::new().to_bytes(false).unwrap().to_vec();
        data[12] = 200;
        assert!(FileList::from_bytes(&data).is_err());

        let mut bad_path = Vec::new();
        bad_path.put_u64_le(0);
        bad_path.put_u32_le(0);
        bad_path.put_u32_le(3);
        bad_path.put_u32_le(0);
        bad_path.put_u32_le(0);
        bad_path.put_u32_le(0);
        bad_path.put_slice(b"..\0");
        assert!(FileList::from_bytes(&bad_path).is_err());
    }

    #[test]
    fn test_trailing_padding_ignored() {
        let mut data = sample_list().to_bytes(false).unwrap().to_vec();
        data.extend_from_slice(&[0xAA; 13]);
        let decoded = FileList::from_bytes(&data).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_missing_streams_mean_unknown() {
        let mut data = Vec::new();
        data.put_u64_le(0);
        data.put_u32_le(0);
        data.put_u32_le(6);
        data.put_u32_le(0);
        data.put_u32_le(0);
        data.put_u32_le(0);
        data.put_slice(b"x\0y/z\0");

        let decoded = FileList::from_bytes(&data).unwrap();
        assert_eq!(decoded.relative_paths(), vec!["x", "y/z"]);
        assert_eq!(decoded.entries()[1].attributes, FileAttributes::default());
        assert!(decoded.full_paths().unwrap().is_empty());
        assert!(decoded.uri_list().is_empty());
    }

    #[test]
    fn test_stream_length_guard() {
        assert!(check_stream_len("relative path", 10, 10).is_ok());
        assert!(matches!(
            check_stream_len("relative path", 11, 10),
            Err(ClipboardError::StreamTooLarge { len: 11, max: 10, .. })
        ));
    }

    #[test]
    fn test_staged_paths() {
        let list = sample_list();
        assert_eq!(
            list.staged_paths(Path::new("/stage")),
            vec![PathBuf::from("/stage/a")]
        );
    }

    #[test]
    fn test_from_paths_walks_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("docs");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("one.txt"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub").join("two.txt"), vec![0u8; 28]).unwrap();
        std::os::unix::fs::symlink(dir.join("one.txt"), dir.join("link")).unwrap();
        let single = temp.path().join("single.bin");
        std::fs::write(&single, vec![1u8; 8]).unwrap();

        let list = FileList::from_paths(&[dir.clone(), single.clone()]).unwrap();

        assert_eq!(
            list.relative_paths(),
            vec!["docs", "docs/one.txt", "docs/sub", "docs/sub/two.txt", "single.bin"]
        );
        assert_eq!(list.total_size(), 136);
        assert_eq!(list.entries()[2].attributes.kind, FileKind::Directory);
        assert_eq!(list.uri_list().len(), 2);
    }
}
