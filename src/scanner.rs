//! Recursive walk that prints a size/percentage tree.
//!
//! Sizes are what the filesystem reports for each directory entry itself,
//! not a recursive sum of the contents. Percentages are relative to the
//! parent directory's own size, rounded down.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

pub const REPORT_HEADER: &str = "Path    Usage   Size";

/// Running counters reported while a walk is in flight.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub files_seen: u32,
    pub dirs_seen: u32,
    /// Share of the root's immediate subdirectories fully walked, 0..=100.
    pub percent: u32,
}

type ProgressHook<'a> = Box<dyn FnMut(&ScanProgress) -> Result<()> + 'a>;

pub struct Scanner<'a, W: Write> {
    root: PathBuf,
    out: W,
    delay: Duration,
    on_progress: ProgressHook<'a>,
}

/// `floor(size / parent_size * 100)`; an empty parent yields 0.
pub fn percentage(size: u64, parent_size: u64) -> u64 {
    if parent_size == 0 {
        return 0;
    }
    (u128::from(size) * 100 / u128::from(parent_size)) as u64
}

pub fn tree_line(display_path: &str, percent: u64, size: u64) -> String {
    format!("|-/{display_path} {percent}% {size}")
}

/// Filesystem-reported size of one path, without traversal.
pub fn entry_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Visible entries below `root`, sorted by name, symlinks never followed.
fn walk(root: &Path, max_depth: usize) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
}

impl<'a, W: Write> Scanner<'a, W> {
    pub fn new(root: &Path, out: W) -> Self {
        Self {
            root: root.to_path_buf(),
            out,
            delay: Duration::ZERO,
            on_progress: Box::new(|_| Ok(())),
        }
    }

    /// Pause after each directory visited.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Called after every directory the walk visits, and once more at the end.
    pub fn on_progress<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&ScanProgress) -> Result<()> + 'a,
    {
        self.on_progress = Box::new(hook);
        self
    }

    /// Walk the whole tree under the root, returning the final counters.
    ///
    /// An unreadable directory is logged and its subtree skipped; the walk
    /// goes on.
    pub fn run(mut self) -> Result<ScanProgress> {
        let root_size = entry_size(&self.root)?;

        writeln!(self.out, "{REPORT_HEADER}")?;
        writeln!(self.out, "{} 100% {root_size}", self.root.display())?;
        writeln!(self.out, "|")?;

        let top_level_total = walk(&self.root, 1)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .count() as u32;
        let mut top_level_started = 0u32;
        let mut progress = ScanProgress::default();
        // parent_sizes[d] is the size of the directory an entry at depth d + 1 sits in.
        let mut parent_sizes = vec![root_size];

        for entry in walk(&self.root, usize::MAX) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(
                        path = ?err.path(),
                        error = %err,
                        "skipping unreadable entry"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                progress.files_seen = progress.files_seen.saturating_add(1);
                continue;
            }

            let depth = entry.depth();
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %err,
                        "cannot stat entry"
                    );
                    continue;
                }
            };
            parent_sizes.truncate(depth);
            let parent_size = parent_sizes.last().copied().unwrap_or(root_size);
            parent_sizes.push(size);

            if depth == 1 {
                // A new first-level directory means the previous one is fully walked.
                if top_level_total > 0 {
                    progress.percent = top_level_started * 100 / top_level_total;
                }
                top_level_started += 1;
            }
            progress.dirs_seen = progress.dirs_seen.saturating_add(1);

            let display_path = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            writeln!(
                self.out,
                "{}",
                tree_line(&display_path, percentage(size, parent_size), size)
            )?;

            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            (self.on_progress)(&progress)?;
        }
        self.out.flush()?;

        progress.percent = 100;
        (self.on_progress)(&progress)?;
        Ok(progress)
    }
}
