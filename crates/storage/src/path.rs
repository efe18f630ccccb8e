//! Path validation.
//!
//! Every path handed to a backend is relative to that backend's root. The
//! pipeline only ever builds `<project>/<file id>` paths, so anything else
//! that shows up here came from a client and is refused rather than repaired.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Longest single path component accepted, in bytes (`NAME_MAX` on the
/// filesystems uploads land on).
pub const MAX_COMPONENT_LEN: usize = 255;

/// Check that `path` names a file strictly below the storage root, and
/// return it with `.` components and repeated separators removed.
///
/// Rejected with [`ErrorKind::InvalidPath`]:
/// - `..` anywhere, even when it would stay inside the root,
/// - absolute paths and Windows prefixes,
/// - components containing NUL or longer than [`MAX_COMPONENT_LEN`],
/// - paths with no components at all.
///
/// ```
/// use depot_storage::validate_path;
/// use std::path::Path;
///
/// assert_eq!(validate_path("proj123/./a1b2_notes.txt").unwrap(), Path::new("proj123/a1b2_notes.txt"));
/// assert!(validate_path("proj123/../proj456/notes.txt").is_err());
/// assert!(validate_path("/proj123/notes.txt").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut validated = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::Normal(name) => {
                let bytes = name.as_encoded_bytes();
                if bytes.len() > MAX_COMPONENT_LEN || bytes.contains(&0) {
                    exn::bail!(invalid());
                }
                validated.push(name);
            },
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    if validated.as_os_str().is_empty() {
        exn::bail!(invalid());
    }
    Ok(validated)
}
