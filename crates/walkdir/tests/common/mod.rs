//! Shared helpers for walkdir integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::{DirEntry, Error, WalkDir};

/// Everything one walk produced, split into entries and errors.
#[derive(Debug)]
pub struct WalkOutput {
    ents: Vec<DirEntry>,
    errs: Vec<Error>,
}

impl WalkOutput {
    pub fn errs(&self) -> &[Error] {
        &self.errs
    }

    pub fn assert_no_errors(&self) {
        assert!(self.errs.is_empty(), "walk errors: {:?}", self.errs);
    }

    /// Entries in the order the walk yielded them.
    pub fn ents(&self) -> &[DirEntry] {
        &self.ents
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.ents.iter().map(|d| d.path().to_path_buf()).collect()
    }

    /// Paths sorted, for walks whose order is unspecified.
    pub fn sorted_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.paths();
        paths.sort();
        paths
    }
}

/// A scratch directory tree that is removed when dropped.
pub struct Dir {
    tmp: TempDir,
}

impl Dir {
    pub fn tmp() -> Dir {
        Dir {
            tmp: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.path().join(path)
    }

    /// Drain `it`, keeping entries and errors apart.
    pub fn run_recursive<I>(&self, it: I) -> WalkOutput
    where
        I: IntoIterator<Item = Result<DirEntry, Error>>,
    {
        let (ok, err): (Vec<_>, Vec<_>) = it.into_iter().partition(|r| r.is_ok());
        WalkOutput {
            ents: ok.into_iter().filter_map(|r| r.ok()).collect(),
            errs: err.into_iter().filter_map(|r| r.err()).collect(),
        }
    }

    /// Walk this directory with the builder produced by `f`.
    pub fn walk_with<F>(&self, f: F) -> WalkOutput
    where
        F: FnOnce(WalkDir) -> WalkDir,
    {
        self.run_recursive(f(WalkDir::new(self.path())))
    }

    pub fn mkdirp<P: AsRef<Path>>(&self, path: P) {
        fs::create_dir_all(self.join(path)).expect("create dirs");
    }

    pub fn touch<P: AsRef<Path>>(&self, path: P) {
        File::create(self.join(path)).expect("create file");
    }

    pub fn touch_all<P: AsRef<Path>>(&self, paths: &[P]) {
        for p in paths {
            self.touch(p);
        }
    }

    #[cfg(unix)]
    pub fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, link_name: Q) {
        std::os::unix::fs::symlink(self.join(src), self.join(link_name)).expect("create symlink");
    }

    /// Symlink with `target` stored as given, relative or dangling.
    #[cfg(unix)]
    pub fn symlink_raw<P: AsRef<Path>, Q: AsRef<Path>>(&self, target: P, link_name: Q) {
        std::os::unix::fs::symlink(target, self.join(link_name)).expect("create symlink");
    }
}
