//! Walkdir - recursive directory traversal
//!
//! - Depth limits (`min_depth`, `max_depth`) that prune rather than filter
//! - Optional symlink following with loop detection
//! - A cap on simultaneously open directory handles (`max_open`)
//! - Per-directory sorting and contents-first ordering
//! - Pruning at file system boundaries
//!
//! ```no_run
//! use walkdir::WalkDir;
//!
//! for entry in WalkDir::new("src").sort_by_file_name() {
//!     let entry = entry?;
//!     println!("{} {}", entry.depth(), entry.path().display());
//! }
//! # Ok::<(), walkdir::Error>(())
//! ```
//!
//! Errors can be dropped with `filter_map(|e| e.ok())` when unreadable
//! directories should be skipped silently.

pub mod dent;
pub mod error;
pub mod same_file;
pub mod walk;

// Re-export key types
#[cfg(unix)]
pub use dent::DirEntryExt;
pub use dent::DirEntry;
pub use error::{Error, Result};
pub use same_file::is_same_file;
pub use walk::{FilterEntry, IntoIter, WalkDir, DEFAULT_MAX_OPEN};

/// Walkdir version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
