//! Turning flat archive entry names into output paths.
//!
//! Entry names use `/` between components regardless of the platform that
//! wrote the archive.

use std::borrow::Cow;
use std::path::Path;

use crate::error::{Error, Result};
use crate::fs::{DirStatus, Filesystem};

mod error;

pub use self::error::PathError;

/// Separator used inside archive entry names.
pub const PATH_ARCHIVE_SEP: u8 = b'/';

#[cfg(not(windows))]
/// The platform-specific separator written back into names while their
/// parent directories are materialized.
pub const PATH_PLATFORM_SEP: u8 = b'/';

#[cfg(windows)]
/// The platform-specific separator written back into names while their
/// parent directories are materialized.
pub const PATH_PLATFORM_SEP: u8 = b'\\';

/// The final component of `name`, after the last separator.
pub fn terminal_component(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == PATH_ARCHIVE_SEP) {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

/// Rejects names that would land outside the output directory.
pub fn check(name: &[u8]) -> std::result::Result<(), PathError> {
    if matches!(name.first(), Some(b'/' | b'\\')) || name.get(1) == Some(&b':') {
        return Err(PathError::Absolute);
    }

    if name
        .split(|&b| b == PATH_ARCHIVE_SEP || b == b'\\')
        .any(|component| component == b"..")
    {
        return Err(PathError::ParentTraversal);
    }

    Ok(())
}

/// Creates every directory leading up to the last component of `name`,
/// shortest prefix first.
///
/// Each separator is rewritten to [`PATH_PLATFORM_SEP`] once its prefix
/// exists, so on return `name` is the platform form of the whole path.
/// Returns how many directories were newly created.
pub fn materialize_parents<F: Filesystem>(name: &mut [u8], fs: &mut F) -> Result<u64> {
    let mut created = 0;

    for j in 0..name.len() {
        if name[j] != PATH_ARCHIVE_SEP {
            continue;
        }
        if j != 0 && create_dir(fs, &name[..j])? == DirStatus::Created {
            created += 1;
        }
        name[j] = PATH_PLATFORM_SEP;
    }

    Ok(created)
}

/// Creates one directory, treating an existing one as success.
pub fn create_dir<F: Filesystem>(fs: &mut F, name: &[u8]) -> Result<DirStatus> {
    let path = to_path(name);

    match fs.create_dir(&path) {
        Ok(status) => {
            tracing::debug!(path = %path.display(), ?status, "materialized directory");
            Ok(status)
        }
        Err(source) => {
            tracing::error!(path = %path.display(), "can not create directory");
            Err(Error::CreateDirectory {
                path: path.into_owned(),
                source,
            })
        }
    }
}

/// Views narrow name bytes as a path.
#[cfg(unix)]
pub fn to_path(name: &[u8]) -> Cow<'_, Path> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Cow::Borrowed(Path::new(OsStr::from_bytes(name)))
}

/// Views narrow name bytes as a path.
#[cfg(not(unix))]
pub fn to_path(name: &[u8]) -> Cow<'_, Path> {
    match std::str::from_utf8(name) {
        Ok(s) => Cow::Borrowed(Path::new(s)),
        Err(_) => Cow::Owned(String::from_utf8_lossy(name).into_owned().into()),
    }
}
