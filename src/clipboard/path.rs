//! Path helpers for the file list codec
//!
//! Three path representations appear on the wire:
//!
//! ```text
//! relative    "dir/file.txt"           separator-normalized UTF-8
//! local full  "/run/user/1000/x/dir"   guest-native absolute path
//! cp name     "run\0user\01000\0x\0dir" components joined by NUL
//! ```
//!
//! Top-level entries additionally get a `file://` URI.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use super::error::{ClipboardError, Result};

/// Characters escaped in a `file://` URI path
const URI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const FILE_SCHEME: &str = "file://";

/// Normalize a relative path: `\` becomes `/`, repeated separators and `.`
/// components collapse, a trailing separator is stripped.
///
/// Rejects absolute paths, `..` components, NUL bytes and paths that are
/// empty after normalization.
pub fn normalize_relative(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(ClipboardError::InvalidPath(format!("embedded NUL in {:?}", path)));
    }

    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(ClipboardError::InvalidPath(format!("relative path is absolute: {}", path)));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(ClipboardError::InvalidPath(format!("parent component in {}", path)));
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(ClipboardError::InvalidPath(format!("empty relative path: {:?}", path)));
    }

    Ok(parts.join("/"))
}

/// True when a normalized relative path names a top-level entry
pub fn is_top_level(relative: &str) -> bool {
    !relative.contains('/')
}

/// Encode an absolute path in the separator-agnostic NUL-joined form
pub fn to_cp_name(path: &Path) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(name) => {
                let bytes = name.as_bytes();
                if bytes.contains(&0) {
                    return Err(ClipboardError::Encoding(format!(
                        "NUL byte in component of {}",
                        path.display()
                    )));
                }
                if !out.is_empty() {
                    out.push(0);
                }
                out.extend_from_slice(bytes);
            }
            Component::ParentDir => {
                return Err(ClipboardError::Encoding(format!(
                    "parent component in {}",
                    path.display()
                )));
            }
            Component::Prefix(_) => {
                return Err(ClipboardError::Encoding(format!(
                    "unsupported prefix in {}",
                    path.display()
                )));
            }
        }
    }

    if out.is_empty() {
        return Err(ClipboardError::Encoding(format!("empty path: {}", path.display())));
    }

    Ok(out)
}

/// Decode a NUL-joined name into an absolute guest path
pub fn from_cp_name(name: &[u8]) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(ClipboardError::Encoding("empty cp name".to_string()));
    }

    let mut path = PathBuf::from("/");
    for part in name.split(|b| *b == 0) {
        match part {
            b"" | b"." => {
                return Err(ClipboardError::Encoding(format!(
                    "empty or dot component in cp name ({} bytes)",
                    name.len()
                )));
            }
            b".." => {
                return Err(ClipboardError::Encoding("parent component in cp name".to_string()));
            }
            other => path.push(OsStr::from_bytes(other)),
        }
    }

    Ok(path)
}

/// Encode an absolute path for an RPC argument in the selected full-path form
pub fn encode_full_path(path: &Path, local: bool) -> Result<Vec<u8>> {
    if local {
        let bytes = path.as_os_str().as_bytes();
        if bytes.contains(&0) {
            return Err(ClipboardError::Encoding(format!("NUL byte in {}", path.display())));
        }
        return Ok(bytes.to_vec());
    }
    to_cp_name(path)
}

/// `file://` URI for an absolute path
pub fn file_uri(path: &Path) -> Result<String> {
    if !path.is_absolute() {
        return Err(ClipboardError::Encoding(format!("URI for relative path {}", path.display())));
    }
    let text = path
        .to_str()
        .ok_or_else(|| ClipboardError::Encoding(format!("non UTF-8 path {}", path.display())))?;

    Ok(format!("{}{}", FILE_SCHEME, utf8_percent_encode(text, URI_PATH)))
}
