//! File identity checks used for symlink loop detection
//!
//! Two paths are the same file when they resolve to the same underlying file
//! object. On Unix this is the (device, inode) pair. Elsewhere, the walker
//! only ever compares directories, and directories cannot be hard linked, so
//! comparing canonicalized paths is sufficient.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Identity of a file object on disk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FileId {
    #[cfg(unix)]
    key: (u64, u64),
    #[cfg(not(unix))]
    key: PathBuf,
}

impl FileId {
    /// Resolve the identity of `path`, following symbolic links.
    pub(crate) fn from_path<P: AsRef<Path>>(path: P) -> io::Result<FileId> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            let md = fs::metadata(path)?;
            Ok(FileId {
                key: (md.dev(), md.ino()),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(FileId {
                key: fs::canonicalize(path)?,
            })
        }
    }
}

/// An open ancestor directory, remembered while following symlinks so that
/// a link pointing back up the tree can be reported instead of descended.
#[derive(Debug)]
pub(crate) struct Ancestor {
    pub(crate) path: PathBuf,
    id: FileId,
}

impl Ancestor {
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> io::Result<Ancestor> {
        let path = path.as_ref();
        Ok(Ancestor {
            path: path.to_path_buf(),
            id: FileId::from_path(path)?,
        })
    }

    pub(crate) fn is_same(&self, child: &FileId) -> bool {
        self.id == *child
    }
}

/// Returns `true` if the two paths point to the same file.
///
/// Symbolic links are followed on both sides.
///
/// ```no_run
/// use walkdir::is_same_file;
///
/// assert!(is_same_file("/bin/sh", "/usr/bin/sh").unwrap_or(false));
/// ```
pub fn is_same_file<P, Q>(p1: P, p2: Q) -> io::Result<bool>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Ok(FileId::from_path(p1)? == FileId::from_path(p2)?)
}

/// Returns the device number of the file at `path` (Unix only).
#[cfg(unix)]
pub(crate) fn device_num<P: AsRef<Path>>(path: P) -> io::Result<u64> {
    use std::os::unix::fs::MetadataExt;

    fs::metadata(path).map(|md| md.dev())
}

#[cfg(not(unix))]
pub(crate) fn device_num<P: AsRef<Path>>(_path: P) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "walkdir: same_file_system option not supported on this platform",
    ))
}
