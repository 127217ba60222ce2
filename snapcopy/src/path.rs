//! Session relative paths.
//!
//! Remote paths are plain `/` separated strings relative to a session root.
//! They come from untrusted peers, so every one of them goes through
//! [`normalize`] before touching the file system.
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use crate::Error;

pub const SEPARATOR: char = '/';

/// Normalize `path` relative to a session root.
///
/// `.` components are dropped and `..` pops the previous component.
/// Absolute paths and `..` climbing above the root are rejected with
/// [`Error::PathEscape`]. The empty result designates the root itself.
pub fn normalize(path: &str) -> crate::Result<Utf8PathBuf> {
    let mut normalized = Utf8PathBuf::new();
    for comp in Utf8Path::new(path).components() {
        match comp {
            Utf8Component::Prefix(..) | Utf8Component::RootDir => {
                return Err(Error::PathEscape(path.to_string()));
            }
            Utf8Component::CurDir => (),
            Utf8Component::ParentDir => {
                if !normalized.pop() {
                    return Err(Error::PathEscape(path.to_string()));
                }
            }
            Utf8Component::Normal(name) => normalized.push(name),
        }
    }
    Ok(normalized)
}

/// Join a child name to a remote path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if parent.ends_with(SEPARATOR) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Check that `name` is a single path component.
///
/// Names received in listings are joined to local paths, so they must not
/// be able to designate anything but a direct child.
pub fn check_name(name: &str) -> crate::Result<()> {
    let mut comps = Utf8Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Utf8Component::Normal(n)), None) if n == name => Ok(()),
        _ => Err(Error::PathEscape(name.to_string())),
    }
}
