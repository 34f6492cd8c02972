//! The recursive directory iterator and its builder.
//!
//! Traversal is depth first. Each directory on the current path keeps a
//! listing on a stack; once `max_open` listings hold a live OS handle, the
//! oldest one is drained into memory before another directory is opened.

use std::cmp::{self, Ordering};
use std::fmt;
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};
use std::vec;

use tracing::{debug, trace};

use crate::dent::DirEntry;
use crate::error::{Error, Result};
use crate::same_file::{device_num, Ancestor, FileId};

/// Default number of directory handles kept open at once.
pub const DEFAULT_MAX_OPEN: usize = 10;

/// `?` for functions returning `Option<Result<_>>`.
macro_rules! itry {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(err) => return Some(Err(From::from(err))),
        }
    };
}

type Sorter = Box<dyn FnMut(&DirEntry, &DirEntry) -> Ordering + Send + Sync + 'static>;

struct WalkOptions {
    follow_links: bool,
    follow_root_links: bool,
    max_open: usize,
    min_depth: usize,
    max_depth: usize,
    sorter: Option<Sorter>,
    contents_first: bool,
    same_file_system: bool,
}

impl fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Closures have no Debug impl.
        let sorter = self.sorter.as_ref().map(|_| "<fn>");
        f.debug_struct("WalkOptions")
            .field("follow_links", &self.follow_links)
            .field("follow_root_links", &self.follow_root_links)
            .field("max_open", &self.max_open)
            .field("min_depth", &self.min_depth)
            .field("max_depth", &self.max_depth)
            .field("sorter", &sorter)
            .field("contents_first", &self.contents_first)
            .field("same_file_system", &self.same_file_system)
            .finish()
    }
}

/// Builder for a recursive directory iterator.
///
/// Entries come out depth first, each directory ahead of its contents unless
/// [`contents_first`] is set. Sibling order is whatever the OS returns unless
/// a sorter is installed with [`sort_by`] or one of its variants. `.` and `..`
/// are never yielded.
///
/// An error is yielded in place of the entry it belongs to and the walk
/// carries on. A directory that cannot be opened shows up as an error and is
/// not descended.
///
/// ```no_run
/// use walkdir::WalkDir;
///
/// for entry in WalkDir::new("foo").min_depth(1).max_depth(3) {
///     println!("{}", entry?.path().display());
/// }
/// # Ok::<(), walkdir::Error>(())
/// ```
///
/// Hard-linked directory cycles are assumed not to exist. Cycles through
/// symbolic links are caught when [`follow_links`] is on and surface as
/// loop errors.
///
/// [`contents_first`]: WalkDir::contents_first
/// [`sort_by`]: WalkDir::sort_by
/// [`follow_links`]: WalkDir::follow_links
#[derive(Debug)]
pub struct WalkDir {
    opts: WalkOptions,
    root: PathBuf,
}

impl WalkDir {
    /// Start a walk at `root`.
    ///
    /// A directory root is yielded first, then its contents. A file root is
    /// the only entry. A symlink root is traversed through unless
    /// [`follow_root_links`] is turned off; its [`DirEntry`] still describes
    /// the link itself unless [`follow_links`] is on.
    ///
    /// [`follow_root_links`]: WalkDir::follow_root_links
    /// [`follow_links`]: WalkDir::follow_links
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        WalkDir {
            opts: WalkOptions {
                follow_links: false,
                follow_root_links: true,
                max_open: DEFAULT_MAX_OPEN,
                min_depth: 0,
                max_depth: usize::MAX,
                sorter: None,
                contents_first: false,
                same_file_system: false,
            },
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Don't yield entries shallower than `depth`. The root is depth 0.
    ///
    /// Lowered to `max_depth` if it would exceed it.
    pub fn min_depth(mut self, depth: usize) -> Self {
        self.opts.min_depth = cmp::min(depth, self.opts.max_depth);
        self
    }

    /// Don't yield or descend into entries deeper than `depth`.
    ///
    /// Raised to `min_depth` if it would fall below it.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.opts.max_depth = cmp::max(depth, self.opts.min_depth);
        self
    }

    /// Follow symbolic links (off by default).
    ///
    /// A followed link is yielded as its target under the link's path.
    /// Broken links and links back to an ancestor yield errors.
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.opts.follow_links = yes;
        self
    }

    /// Traverse through a root that is a symlink to a directory (on by
    /// default).
    ///
    /// When off, a symlink root is yielded on its own and not descended.
    pub fn follow_root_links(mut self, yes: bool) -> Self {
        self.opts.follow_root_links = yes;
        self
    }

    /// Cap the number of directory handles open at once. `0` is treated
    /// as `1`.
    ///
    /// The entries yielded never depend on this value. When the cap is hit,
    /// the oldest open listing is read to the end and buffered so its handle
    /// can be released. Buffered memory grows with tree depth rather than
    /// width, so small caps work fine.
    pub fn max_open(mut self, n: usize) -> Self {
        self.opts.max_open = cmp::max(n, 1);
        self
    }

    /// Order the entries of each directory with `cmp`.
    ///
    /// ```no_run
    /// use walkdir::WalkDir;
    ///
    /// WalkDir::new("foo").sort_by(|a, b| a.file_name().cmp(b.file_name()));
    /// ```
    pub fn sort_by<F>(mut self, cmp: F) -> Self
    where
        F: FnMut(&DirEntry, &DirEntry) -> Ordering + Send + Sync + 'static,
    {
        self.opts.sorter = Some(Box::new(cmp));
        self
    }

    /// Order the entries of each directory by the key `f` extracts.
    pub fn sort_by_key<K, F>(self, mut f: F) -> Self
    where
        F: FnMut(&DirEntry) -> K + Send + Sync + 'static,
        K: Ord,
    {
        self.sort_by(move |a, b| f(a).cmp(&f(b)))
    }

    /// Order the entries of each directory by file name.
    pub fn sort_by_file_name(self) -> Self {
        self.sort_by(|a, b| a.file_name().cmp(b.file_name()))
    }

    /// Yield each directory after everything beneath it (off by default).
    ///
    /// Given
    ///
    /// ```text
    /// src/
    ///   bin/
    ///     main.rs
    ///     util.rs
    ///   lib/
    /// ```
    ///
    /// the default order is `src`, `src/bin`, `src/bin/main.rs`,
    /// `src/bin/util.rs`, `src/lib`. With this option it becomes
    /// `src/bin/main.rs`, `src/bin/util.rs`, `src/bin`, `src/lib`, `src`.
    pub fn contents_first(mut self, yes: bool) -> Self {
        self.opts.contents_first = yes;
        self
    }

    /// Don't descend into directories living on another device than the
    /// root.
    ///
    /// Such directories are still yielded. Unix only: on other platforms the
    /// walk yields one error and ends.
    pub fn same_file_system(mut self, yes: bool) -> Self {
        self.opts.same_file_system = yes;
        self
    }
}

impl IntoIterator for WalkDir {
    type Item = Result<DirEntry>;
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter {
            opts: self.opts,
            start: Some(self.root),
            stack_list: vec![],
            stack_path: vec![],
            oldest_opened: 0,
            depth: 0,
            deferred_dirs: vec![],
            root_device: None,
            descended: false,
        }
    }
}

/// Iterator over a directory tree, built from a [`WalkDir`].
#[derive(Debug)]
pub struct IntoIter {
    opts: WalkOptions,
    /// Root path, taken on the first call to `next`.
    start: Option<PathBuf>,
    /// One listing per directory on the current path.
    stack_list: Vec<DirList>,
    /// Identities of the directories on the current path. Only maintained
    /// while following links.
    stack_path: Vec<Ancestor>,
    /// Index of the oldest listing that still holds an OS handle.
    oldest_opened: usize,
    /// `stack_list.len()` as of the start of the current step.
    depth: usize,
    /// Directories waiting on their contents (contents_first only).
    deferred_dirs: Vec<DirEntry>,
    /// Device of the root; set only with same_file_system.
    root_device: Option<u64>,
    /// Whether the entry just yielded had its listing pushed, leaving it on
    /// top of `stack_list`.
    descended: bool,
}

/// One directory's listing on the walker's stack.
#[derive(Debug)]
enum DirList {
    /// Backed by a live OS handle. `depth` is the directory's own depth.
    /// A failed `read_dir` is held as `Err(Some(_))` and yielded once.
    Opened {
        depth: usize,
        it: std::result::Result<ReadDir, Option<Error>>,
    },
    /// Drained into memory.
    Closed(vec::IntoIter<Result<DirEntry>>),
}

impl Iterator for IntoIter {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Result<DirEntry>> {
        self.descended = false;
        if let Some(start) = self.start.take() {
            if self.opts.same_file_system {
                let result = device_num(&start).map_err(|e| Error::from_path(0, start.clone(), e));
                self.root_device = Some(itry!(result));
            }
            let dent = itry!(DirEntry::from_path(0, start, false));
            if let Some(result) = self.handle_entry(dent) {
                return Some(result);
            }
        }
        while !self.stack_list.is_empty() {
            self.depth = self.stack_list.len();
            if let Some(dentry) = self.get_deferred_dir() {
                return Some(Ok(dentry));
            }
            if self.depth > self.opts.max_depth {
                // Everything in this listing is too deep.
                self.pop();
                continue;
            }
            let next = match self.stack_list.last_mut() {
                Some(list) => list.next(),
                None => break,
            };
            match next {
                None => self.pop(),
                Some(Err(err)) => return Some(Err(err)),
                Some(Ok(dent)) => {
                    if let Some(result) = self.handle_entry(dent) {
                        return Some(result);
                    }
                }
            }
        }
        if self.opts.contents_first {
            self.depth = self.stack_list.len();
            if let Some(dentry) = self.get_deferred_dir() {
                return Some(Ok(dentry));
            }
        }
        None
    }
}

impl IntoIter {
    /// Stop descending the most recently yielded directory.
    ///
    /// If the last entry yielded was not a directory, the rest of its parent
    /// is dropped instead. Before the first `next` this does nothing.
    ///
    /// ```no_run
    /// use walkdir::WalkDir;
    ///
    /// let mut it = WalkDir::new("foo").into_iter();
    /// while let Some(entry) = it.next() {
    ///     let entry = entry?;
    ///     if entry.file_name() == "target" {
    ///         it.skip_current_dir();
    ///         continue;
    ///     }
    ///     println!("{}", entry.path().display());
    /// }
    /// # Ok::<(), walkdir::Error>(())
    /// ```
    pub fn skip_current_dir(&mut self) {
        if !self.stack_list.is_empty() {
            self.pop();
        }
    }

    /// Drop the listing of the entry just yielded, if it opened one.
    fn skip_descended(&mut self) {
        if self.descended {
            self.descended = false;
            self.pop();
        }
    }

    /// Drop entries rejected by `predicate`, and don't descend into rejected
    /// directories.
    ///
    /// Errors pass through untouched, and entries outside the depth limits
    /// never reach the predicate. With `contents_first` a directory is only
    /// seen after its contents, so this acts like a plain `filter`. The same
    /// goes for directories that were never descended, such as those on
    /// another device under `same_file_system`.
    ///
    /// Filters can be layered; an entry must pass all of them.
    ///
    /// ```no_run
    /// use walkdir::WalkDir;
    ///
    /// let visible = WalkDir::new("foo")
    ///     .into_iter()
    ///     .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));
    /// for entry in visible {
    ///     println!("{}", entry?.path().display());
    /// }
    /// # Ok::<(), walkdir::Error>(())
    /// ```
    pub fn filter_entry<P>(self, predicate: P) -> FilterEntry<Self, P>
    where
        P: FnMut(&DirEntry) -> bool,
    {
        FilterEntry { it: self, predicate }
    }

    fn handle_entry(&mut self, mut dent: DirEntry) -> Option<Result<DirEntry>> {
        if self.opts.follow_links && dent.file_type().is_symlink() {
            dent = itry!(self.follow(dent));
        }
        let is_normal_dir = !dent.file_type().is_symlink() && dent.is_dir();
        let mut pushed = false;
        let mut linked_root = false;
        if is_normal_dir {
            if self.opts.same_file_system && dent.depth() > 0 {
                if itry!(self.is_same_file_system(&dent)) {
                    itry!(self.push(&dent));
                    pushed = true;
                } else {
                    debug!(path = %dent.path().display(), "not crossing file system boundary");
                }
            } else {
                itry!(self.push(&dent));
                pushed = true;
            }
        } else if dent.depth() == 0 && dent.file_type().is_symlink() && self.opts.follow_root_links
        {
            // Descend through a symlinked root while the entry keeps
            // describing the link.
            let md = itry!(fs::metadata(dent.path()).map_err(|err| Error::from_entry(&dent, err)));
            if md.file_type().is_dir() {
                itry!(self.push(&dent));
                pushed = true;
                linked_root = true;
            }
        }
        if (is_normal_dir || linked_root) && self.opts.contents_first {
            // An undescended directory is released again on the next step.
            self.deferred_dirs.push(dent);
            None
        } else if self.skippable(dent.depth()) {
            None
        } else {
            self.descended = pushed;
            Some(Ok(dent))
        }
    }

    fn get_deferred_dir(&mut self) -> Option<DirEntry> {
        if self.opts.contents_first && self.depth < self.deferred_dirs.len() {
            let deferred = self.deferred_dirs.pop()?;
            if !self.skippable(deferred.depth()) {
                return Some(deferred);
            }
        }
        None
    }

    fn push(&mut self, dent: &DirEntry) -> Result<()> {
        let free = self.stack_list.len().saturating_sub(self.oldest_opened);
        if free == self.opts.max_open {
            trace!(
                index = self.oldest_opened,
                "closing oldest open directory handle"
            );
            self.stack_list[self.oldest_opened].close();
        }
        let rd = fs::read_dir(dent.path())
            .map_err(|err| Some(Error::from_path(self.depth, dent.path().to_path_buf(), err)));
        let mut list = DirList::Opened {
            depth: self.depth,
            it: rd,
        };
        if let Some(cmp) = self.opts.sorter.as_mut() {
            let mut entries: Vec<_> = list.collect();
            entries.sort_by(|a, b| match (a, b) {
                (Ok(a), Ok(b)) => cmp(a, b),
                (Err(_), Err(_)) => Ordering::Equal,
                (Ok(_), Err(_)) => Ordering::Greater,
                (Err(_), Ok(_)) => Ordering::Less,
            });
            list = DirList::Closed(entries.into_iter());
        }
        if self.opts.follow_links {
            let ancestor = Ancestor::new(dent.path()).map_err(|err| Error::from_io(self.depth, err))?;
            self.stack_path.push(ancestor);
        }
        // A failed ancestor lookup must leave both stacks untouched.
        self.stack_list.push(list);
        // Advance only once the new listing is on the stack so the index
        // stays in bounds.
        if free == self.opts.max_open {
            self.oldest_opened += 1;
        }
        Ok(())
    }

    fn pop(&mut self) {
        self.stack_list.pop();
        if self.opts.follow_links {
            self.stack_path.pop();
        }
        // With every remaining listing closed, the next open lands on top.
        self.oldest_opened = cmp::min(self.oldest_opened, self.stack_list.len());
    }

    fn follow(&self, dent: DirEntry) -> Result<DirEntry> {
        let dent = DirEntry::from_path(dent.depth(), dent.into_path(), true)?;
        // Only a directory target can close a cycle.
        if dent.is_dir() {
            self.check_loop(dent.path())?;
        }
        Ok(dent)
    }

    fn check_loop<P: AsRef<Path>>(&self, child: P) -> Result<()> {
        let child = child.as_ref();
        let hchild = FileId::from_path(child).map_err(|err| Error::from_io(self.depth, err))?;
        for ancestor in self.stack_path.iter().rev() {
            if ancestor.is_same(&hchild) {
                debug!(
                    child = %child.display(),
                    ancestor = %ancestor.path.display(),
                    "symlink loop detected"
                );
                return Err(Error::from_loop(self.depth, &ancestor.path, child));
            }
        }
        Ok(())
    }

    fn is_same_file_system(&self, dent: &DirEntry) -> Result<bool> {
        let dent_device = device_num(dent.path()).map_err(|err| Error::from_entry(dent, err))?;
        Ok(self.root_device == Some(dent_device))
    }

    fn skippable(&self, depth: usize) -> bool {
        depth < self.opts.min_depth || depth > self.opts.max_depth
    }
}

impl DirList {
    fn close(&mut self) {
        if let DirList::Opened { .. } = *self {
            *self = DirList::Closed(self.collect::<Vec<_>>().into_iter());
        }
    }
}

impl Iterator for DirList {
    type Item = Result<DirEntry>;

    #[inline(always)]
    fn next(&mut self) -> Option<Result<DirEntry>> {
        match *self {
            DirList::Closed(ref mut it) => it.next(),
            DirList::Opened { depth, ref mut it } => match *it {
                Err(ref mut err) => err.take().map(Err),
                Ok(ref mut rd) => rd.next().map(|r| match r {
                    Ok(r) => DirEntry::from_entry(depth + 1, &r),
                    Err(err) => Err(Error::from_io(depth + 1, err)),
                }),
            },
        }
    }
}

mod sealed {
    use super::{DirEntry, Result};

    /// A walk that a [`FilterEntry`](super::FilterEntry) can prune.
    pub trait Prune: Iterator<Item = Result<DirEntry>> {
        fn prune_current(&mut self);
        fn prune_rejected(&mut self);
    }
}

use sealed::Prune;

impl Prune for IntoIter {
    fn prune_current(&mut self) {
        self.skip_current_dir();
    }

    fn prune_rejected(&mut self) {
        self.skip_descended();
    }
}

/// A walk that skips entries rejected by a predicate along with everything
/// beneath rejected directories.
///
/// Built by [`IntoIter::filter_entry`], and layered by
/// [`FilterEntry::filter_entry`].
#[derive(Debug)]
pub struct FilterEntry<I, P> {
    it: I,
    predicate: P,
}

impl<I, P> Iterator for FilterEntry<I, P>
where
    I: Prune,
    P: FnMut(&DirEntry) -> bool,
{
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Result<DirEntry>> {
        loop {
            let dent = match self.it.next() {
                None => return None,
                Some(result) => itry!(result),
            };
            if !(self.predicate)(&dent) {
                self.it.prune_rejected();
                continue;
            }
            return Some(Ok(dent));
        }
    }
}

impl<I, P> Prune for FilterEntry<I, P>
where
    I: Prune,
    P: FnMut(&DirEntry) -> bool,
{
    fn prune_current(&mut self) {
        self.it.prune_current();
    }

    fn prune_rejected(&mut self) {
        self.it.prune_rejected();
    }
}

impl<I, P> FilterEntry<I, P>
where
    I: Prune,
    P: FnMut(&DirEntry) -> bool,
{
    /// Layer another filter over this one.
    pub fn filter_entry<Q>(self, predicate: Q) -> FilterEntry<Self, Q>
    where
        Q: FnMut(&DirEntry) -> bool,
    {
        FilterEntry { it: self, predicate }
    }

    /// See [`IntoIter::skip_current_dir`].
    pub fn skip_current_dir(&mut self) {
        self.it.prune_current();
    }
}
