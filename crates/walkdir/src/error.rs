//! Error types for directory traversal

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dent::DirEntry;

/// A failure during a walk.
///
/// Carries the depth it happened at along with either an I/O error (plus the
/// path involved, when known) or a symlink loop. Converts into
/// [`io::Error`] without losing that context.
#[derive(Error, Debug)]
#[error("{inner}")]
pub struct Error {
    depth: usize,
    #[source]
    inner: ErrorInner,
}

/// The two ways a walk can fail.
#[derive(Error, Debug)]
pub(crate) enum ErrorInner {
    #[error("IO error for operation on {}: {err}", path_display(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        err: io::Error,
    },

    #[error(
        "File system loop found: {} points to an ancestor {}",
        .child.display(),
        .ancestor.display()
    )]
    Loop { ancestor: PathBuf, child: PathBuf },
}

fn path_display(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<unknown path>".to_string(),
    }
}

impl Error {
    /// Path involved in the failure. For a loop this is the child.
    pub fn path(&self) -> Option<&Path> {
        match &self.inner {
            ErrorInner::Io { path: None, .. } => None,
            ErrorInner::Io { path: Some(path), .. } => Some(path),
            ErrorInner::Loop { child, .. } => Some(child),
        }
    }

    /// The ancestor a symlink loop points back to.
    pub fn loop_ancestor(&self) -> Option<&Path> {
        match &self.inner {
            ErrorInner::Loop { ancestor, .. } => Some(ancestor),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Underlying I/O error; `None` for loops.
    pub fn io_error(&self) -> Option<&io::Error> {
        match &self.inner {
            ErrorInner::Io { err, .. } => Some(err),
            ErrorInner::Loop { .. } => None,
        }
    }

    /// Owned variant of [`io_error`](Error::io_error).
    pub fn into_io_error(self) -> Option<io::Error> {
        match self.inner {
            ErrorInner::Io { err, .. } => Some(err),
            ErrorInner::Loop { .. } => None,
        }
    }

    /// Whether this error was produced by following a symlink cycle.
    pub fn is_loop(&self) -> bool {
        matches!(self.inner, ErrorInner::Loop { .. })
    }

    pub(crate) fn from_path(depth: usize, pb: PathBuf, err: io::Error) -> Self {
        Error {
            depth,
            inner: ErrorInner::Io { path: Some(pb), err },
        }
    }

    pub(crate) fn from_entry(dent: &DirEntry, err: io::Error) -> Self {
        Error {
            depth: dent.depth(),
            inner: ErrorInner::Io {
                path: Some(dent.path().to_path_buf()),
                err,
            },
        }
    }

    pub(crate) fn from_io(depth: usize, err: io::Error) -> Self {
        Error {
            depth,
            inner: ErrorInner::Io { path: None, err },
        }
    }

    pub(crate) fn from_loop(depth: usize, ancestor: &Path, child: &Path) -> Self {
        Error {
            depth,
            inner: ErrorInner::Loop {
                ancestor: ancestor.to_path_buf(),
                child: child.to_path_buf(),
            },
        }
    }
}

/// Keeps the walk error as the inner error, so the message retains its
/// context. Loops map to `ErrorKind::Other`.
impl From<Error> for io::Error {
    fn from(walk_err: Error) -> io::Error {
        let kind = match &walk_err.inner {
            ErrorInner::Io { err, .. } => err.kind(),
            ErrorInner::Loop { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, walk_err)
    }
}

/// Result type for walk operations
pub type Result<T> = std::result::Result<T, Error>;
