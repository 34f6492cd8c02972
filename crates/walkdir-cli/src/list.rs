//! `walkdir list`: a small `find`, written to exercise every walker option.
//!
//! Paths are written as raw bytes on Unix and block buffered when stdout is
//! not a terminal.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use bstr::ByteVec;
use clap::Args;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Directories to list
    #[arg(default_value = "./")]
    pub dirs: Vec<PathBuf>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// Only show entries at or above this depth
    #[arg(long)]
    pub min_depth: Option<usize>,

    /// Only show entries at or below this depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Use at most this many open file descriptors
    #[arg(long, default_value_t = walkdir::DEFAULT_MAX_OPEN)]
    pub max_open: usize,

    /// Sort the entries of each directory by file name
    #[arg(long)]
    pub sort: bool,

    /// Show directory contents before the directory path
    #[arg(long, visible_alias = "depth-first")]
    pub contents_first: bool,

    /// Only show paths on the same file system as the root
    #[arg(short = 'x', long)]
    pub same_file_system: bool,

    /// Don't print error messages
    #[arg(short = 'q', long)]
    pub ignore_errors: bool,

    /// Print only a total count of all file paths
    #[arg(short, long)]
    pub count: bool,

    /// Print the total size of all regular files; implies --count
    #[arg(long)]
    pub file_size: bool,

    /// List a single directory with std::fs::read_dir (not recursive)
    #[arg(long)]
    pub flat_std: bool,

    /// Print timing info
    #[arg(short, long)]
    pub timeit: bool,
}

impl ListArgs {
    /// The walker configured by these flags for `path`.
    pub fn walkdir(&self, path: &Path) -> WalkDir {
        let mut walkdir = WalkDir::new(path)
            .follow_links(self.follow_links)
            .contents_first(self.contents_first)
            .same_file_system(self.same_file_system)
            .max_open(self.max_open);
        if let Some(x) = self.min_depth {
            walkdir = walkdir.min_depth(x);
        }
        if let Some(x) = self.max_depth {
            walkdir = walkdir.max_depth(x);
        }
        if self.sort {
            walkdir = walkdir.sort_by_file_name();
        }
        walkdir
    }

    fn counting(&self) -> bool {
        self.count || self.file_size
    }

    fn empty_count(&self) -> CountResult {
        CountResult {
            count: 0,
            size: if self.file_size { Some(0) } else { None },
        }
    }
}

/// Running totals for `--count` and `--file-size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountResult {
    pub count: u64,
    pub size: Option<u64>,
}

impl CountResult {
    fn add(self, other: CountResult) -> CountResult {
        CountResult {
            count: self.count + other.count,
            size: self.size.and_then(|s1| other.size.map(|s2| s1 + s2)),
        }
    }

    fn record(&mut self, is_file: bool, len: impl FnOnce() -> Option<u64>) {
        self.count += 1;
        if let Some(size) = self.size.as_mut() {
            if is_file {
                *size += len().unwrap_or(0);
            }
        }
    }
}

/// Run `walkdir list`.
pub fn cmd_list(args: &ListArgs) -> Result<()> {
    debug!(?args, "listing");
    let mut stderr = io::stderr();

    let start = Instant::now();
    let stdout = io::stdout();
    if args.counting() {
        print_count(args, stdout.lock(), &mut stderr)?;
    } else if stdout.is_terminal() {
        print_paths(args, stdout.lock(), &mut stderr)?;
    } else {
        print_paths(args, io::BufWriter::new(stdout.lock()), &mut stderr)?;
    }
    if args.timeit {
        writeln!(stderr, "duration: {:?}", start.elapsed())?;
    }
    Ok(())
}

/// Count (and optionally size) every entry under `args.dirs`.
pub fn count(args: &ListArgs, mut stderr: impl Write) -> Result<CountResult> {
    let mut total = args.empty_count();
    for dir in &args.dirs {
        let res = if args.flat_std {
            count_std(args, &mut stderr, dir)?
        } else {
            count_walkdir(args, &mut stderr, dir)?
        };
        total = total.add(res);
    }
    Ok(total)
}

fn count_walkdir(args: &ListArgs, mut stderr: impl Write, dir: &Path) -> Result<CountResult> {
    let mut res = args.empty_count();
    for result in args.walkdir(dir) {
        match result {
            Ok(dent) => {
                let mut md_err = None;
                res.record(dent.file_type().is_file(), || match dent.metadata() {
                    Ok(md) => Some(md.len()),
                    Err(err) => {
                        md_err = Some(err);
                        None
                    }
                });
                if let Some(err) = md_err {
                    report(args, &mut stderr, &err)?;
                }
            }
            Err(err) => report(args, &mut stderr, &err)?,
        }
    }
    Ok(res)
}

fn count_std(args: &ListArgs, mut stderr: impl Write, dir: &Path) -> Result<CountResult> {
    let mut res = args.empty_count();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for result in entries {
        match result {
            Ok(dent) => {
                let is_file = dent.file_type().map(|t| t.is_file()).unwrap_or(false);
                res.record(is_file, || dent.metadata().ok().map(|md| md.len()));
            }
            Err(err) => report(args, &mut stderr, &err)?,
        }
    }
    Ok(res)
}

fn print_count(args: &ListArgs, mut stdout: impl Write, stderr: impl Write) -> Result<()> {
    let res = count(args, stderr)?;
    match res.size {
        Some(size) => writeln!(stdout, "{} (file size: {})", res.count, size)?,
        None => writeln!(stdout, "{}", res.count)?,
    }
    stdout.flush()?;
    Ok(())
}

/// Write one path per line for every entry under `args.dirs`.
pub fn print_paths(args: &ListArgs, mut stdout: impl Write, mut stderr: impl Write) -> Result<()> {
    for dir in &args.dirs {
        if args.flat_std {
            print_std(args, &mut stdout, &mut stderr, dir)?;
        } else {
            print_walkdir(args, &mut stdout, &mut stderr, dir)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn print_walkdir(
    args: &ListArgs,
    mut stdout: impl Write,
    mut stderr: impl Write,
    dir: &Path,
) -> Result<()> {
    for result in args.walkdir(dir) {
        match result {
            Ok(dent) => {
                write_os_str(&mut stdout, dent.path().as_os_str())?;
                stdout.write_all(b"\n")?;
            }
            Err(err) => report(args, &mut stderr, &err)?,
        }
    }
    Ok(())
}

fn print_std(
    args: &ListArgs,
    mut stdout: impl Write,
    mut stderr: impl Write,
    dir: &Path,
) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for result in entries {
        match result {
            Ok(dent) => {
                write_os_str(&mut stdout, &dent.file_name())?;
                stdout.write_all(b"\n")?;
            }
            Err(err) => report(args, &mut stderr, &err)?,
        }
    }
    Ok(())
}

fn report(args: &ListArgs, mut stderr: impl Write, err: &dyn std::fmt::Display) -> io::Result<()> {
    if args.ignore_errors {
        return Ok(());
    }
    writeln!(stderr, "ERROR: {}", err)
}

/// Write `os` as bytes: untouched on Unix, lossily re-encoded elsewhere.
fn write_os_str(mut wtr: impl Write, os: &OsStr) -> io::Result<()> {
    wtr.write_all(&Vec::<u8>::from_os_str_lossy(os))
}
