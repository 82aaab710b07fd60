//! The filesystem side of extraction.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read-only attribute bit of the archive attribute word.
pub const FILE_ATTRIBUTE_READONLY: u32 = 0x1;

/// Set when the high 16 bits of the attribute word carry a Unix mode.
pub const FILE_ATTRIBUTE_UNIX_EXTENSION: u32 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyExists,
}

/// Where extracted entries are written.
///
/// Paths handed to a `Filesystem` are relative to wherever the implementation
/// decides extraction happens.
pub trait Filesystem {
    type File;

    fn create_dir(&mut self, path: &Path) -> io::Result<DirStatus>;

    fn open_for_write(&mut self, path: &Path) -> io::Result<Self::File>;

    /// Returns the number of bytes written; anything short of `bytes.len()`
    /// is treated as a failed write.
    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> io::Result<usize>;

    fn close(&mut self, file: Self::File) -> io::Result<()>;

    /// Best effort; implementations swallow their own failures.
    fn set_attributes(&mut self, path: &Path, attributes: u32);
}

/// Writes below a root directory on the real filesystem.
#[derive(Debug, Clone)]
pub struct StdFilesystem {
    root: PathBuf,
}

impl StdFilesystem {
    pub fn new<P: Into<PathBuf>>(root: P) -> StdFilesystem {
        StdFilesystem { root: root.into() }
    }

    #[inline(always)]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Filesystem for StdFilesystem {
    type File = BufWriter<File>;

    fn create_dir(&mut self, path: &Path) -> io::Result<DirStatus> {
        match fs::create_dir(self.root.join(path)) {
            Ok(()) => Ok(DirStatus::Created),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(DirStatus::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    fn open_for_write(&mut self, path: &Path) -> io::Result<Self::File> {
        File::create(self.root.join(path)).map(BufWriter::new)
    }

    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> io::Result<usize> {
        file.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn close(&mut self, file: Self::File) -> io::Result<()> {
        file.into_inner().map_err(|e| e.into_error())?;
        Ok(())
    }

    fn set_attributes(&mut self, path: &Path, attributes: u32) {
        let path = self.root.join(path);
        if let Err(error) = apply_attributes(&path, attributes) {
            tracing::debug!(path = %path.display(), attributes, %error, "cannot set attributes");
        }
    }
}

#[cfg(unix)]
fn apply_attributes(path: &Path, attributes: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = (attributes >> 16) & 0o7777;
    if attributes & FILE_ATTRIBUTE_UNIX_EXTENSION != 0 && mode != 0 {
        return fs::set_permissions(path, fs::Permissions::from_mode(mode));
    }

    set_readonly(path, attributes)
}

#[cfg(not(unix))]
fn apply_attributes(path: &Path, attributes: u32) -> io::Result<()> {
    set_readonly(path, attributes)
}

fn set_readonly(path: &Path, attributes: u32) -> io::Result<()> {
    if attributes & FILE_ATTRIBUTE_READONLY == 0 {
        return Ok(());
    }
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_dir_reports_existing() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut fs = StdFilesystem::new(temp.path());

        assert_eq!(fs.create_dir(Path::new("docs")).unwrap(), DirStatus::Created);
        assert_eq!(
            fs.create_dir(Path::new("docs")).unwrap(),
            DirStatus::AlreadyExists
        );
        assert!(fs.create_dir(Path::new("missing/child")).is_err());
    }

    #[test]
    fn written_bytes_land_below_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut fs = StdFilesystem::new(temp.path());

        let mut file = fs.open_for_write(Path::new("hello.txt")).unwrap();
        assert_eq!(fs.write(&mut file, b"hello").unwrap(), 5);
        fs.close(file).unwrap();

        assert_eq!(std::fs::read(temp.path().join("hello.txt")).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn unix_mode_from_attribute_word() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let mut fs = StdFilesystem::new(temp.path());
        let file = fs.open_for_write(Path::new("run.sh")).unwrap();
        fs.close(file).unwrap();

        fs.set_attributes(Path::new("run.sh"), (0o750 << 16) | FILE_ATTRIBUTE_UNIX_EXTENSION);

        let mode = std::fs::metadata(temp.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn attribute_failures_are_ignored() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut fs = StdFilesystem::new(temp.path());
        fs.set_attributes(Path::new("missing.txt"), FILE_ATTRIBUTE_READONLY);
    }
}
