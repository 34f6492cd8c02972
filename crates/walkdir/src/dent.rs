//! Entries yielded by a walk.

use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One entry produced by a walk.
///
/// The file type is captured when the entry is created, so [`file_type`] and
/// [`is_dir`] never touch the file system. [`path`] is always the path the
/// walk reached, symlink or not. When the walk follows links, everything
/// else describes the link target.
///
/// On Unix the inode number is available through [`DirEntryExt`].
///
/// [`file_type`]: DirEntry::file_type
/// [`is_dir`]: DirEntry::is_dir
/// [`path`]: DirEntry::path
#[derive(Clone)]
pub struct DirEntry {
    /// Path as reached by the walk, never resolved.
    path: PathBuf,
    ty: FileType,
    /// Set when this entry came from a link the walk followed.
    follow_link: bool,
    depth: usize,
    #[cfg(unix)]
    ino: u64,
}

impl DirEntry {
    /// Path of this entry: the root joined with every name down to here.
    ///
    /// Symlinks are not resolved. Use [`path_is_symlink`] and
    /// [`std::fs::read_link`] to get at a target.
    ///
    /// [`path_is_symlink`]: DirEntry::path_is_symlink
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owned variant of [`path`](DirEntry::path).
    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Whether this entry was reached through a symbolic link, whether or not
    /// the walk followed it.
    pub fn path_is_symlink(&self) -> bool {
        self.ty.is_symlink() || self.follow_link
    }

    /// Fetch metadata for this entry.
    ///
    /// Resolves symlinks only when the walk follows links. Fails like
    /// [`std::fs::metadata`] when the file is gone or unreadable.
    pub fn metadata(&self) -> Result<fs::Metadata> {
        let md = if self.follow_link {
            fs::metadata(&self.path)
        } else {
            fs::symlink_metadata(&self.path)
        };
        md.map_err(|err| Error::from_entry(self, err))
    }

    /// File type captured when the entry was created. No system call.
    pub fn file_type(&self) -> FileType {
        self.ty
    }

    pub fn is_dir(&self) -> bool {
        self.ty.is_dir()
    }

    /// Last path component, or the whole path when there is none (`/`).
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_else(|| self.path.as_os_str())
    }

    /// Distance from the root, which is depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn from_entry(depth: usize, ent: &fs::DirEntry) -> Result<DirEntry> {
        let ty = ent
            .file_type()
            .map_err(|err| Error::from_path(depth, ent.path(), err))?;
        Ok(DirEntry {
            path: ent.path(),
            ty,
            follow_link: false,
            depth,
            #[cfg(unix)]
            ino: {
                use std::os::unix::fs::DirEntryExt as _;
                ent.ino()
            },
        })
    }

    pub(crate) fn from_path(depth: usize, pb: PathBuf, follow: bool) -> Result<DirEntry> {
        let md = if follow {
            fs::metadata(&pb).map_err(|err| Error::from_path(depth, pb.clone(), err))?
        } else {
            fs::symlink_metadata(&pb).map_err(|err| Error::from_path(depth, pb.clone(), err))?
        };
        Ok(DirEntry {
            path: pb,
            ty: md.file_type(),
            follow_link: follow,
            depth,
            #[cfg(unix)]
            ino: {
                use std::os::unix::fs::MetadataExt as _;
                md.ino()
            },
        })
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirEntry({:?})", self.path)
    }
}

/// Unix-only accessors for [`DirEntry`].
#[cfg(unix)]
pub trait DirEntryExt {
    /// Inode number of the entry.
    fn ino(&self) -> u64;
}

#[cfg(unix)]
impl DirEntryExt for DirEntry {
    fn ino(&self) -> u64 {
        self.ino
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let dent = DirEntry::from_path(0, file.clone(), false).unwrap();
        assert_eq!(dent.path(), file.as_path());
        assert_eq!(dent.file_name(), "a.txt");
        assert_eq!(dent.depth(), 0);
        assert!(dent.file_type().is_file());
        assert!(!dent.is_dir());
        assert!(!dent.path_is_symlink());
        assert_eq!(dent.metadata().unwrap().len(), 5);
    }

    #[test]
    fn test_from_path_missing_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = DirEntry::from_path(1, missing.clone(), false).unwrap_err();
        assert_eq!(err.depth(), 1);
        assert_eq!(err.path(), Some(missing.as_path()));
        assert_eq!(
            err.io_error().map(|e| e.kind()),
            Some(std::io::ErrorKind::NotFound)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_name_of_root_falls_back_to_path() {
        let dent = DirEntry::from_path(0, PathBuf::from("/"), false).unwrap();
        assert_eq!(dent.file_name(), "/");
    }

    #[cfg(unix)]
    #[test]
    fn test_followed_symlink_reports_target_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("target"), &link).unwrap();

        let unfollowed = DirEntry::from_path(1, link.clone(), false).unwrap();
        assert!(unfollowed.file_type().is_symlink());
        assert!(unfollowed.path_is_symlink());

        let followed = DirEntry::from_path(1, link, true).unwrap();
        assert!(followed.is_dir());
        assert!(followed.path_is_symlink());
        assert!(followed.metadata().unwrap().is_dir());
        assert_ne!(followed.ino(), 0);
    }
}
