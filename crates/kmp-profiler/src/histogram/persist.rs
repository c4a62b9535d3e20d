//! Histogram persistence.
//!
//! Every cycle rewrites one `<name>.txt` file per category with the complete
//! cumulative histogram. Files are replaced atomically (temp file + rename in
//! the same directory), so a reader never sees a half-written table.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{trace, warn};

use super::HistogramStore;
use crate::error::PersistError;
use crate::names::{file_stem, CategoryNames};
use crate::Category;

/// File extension of histogram files.
pub const HISTOGRAM_FILE_EXTENSION: &str = "txt";

/// Outcome of writing a store to disk.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    /// Files successfully replaced.
    pub files_written: usize,
    /// Per-category failures. Other categories were still attempted.
    pub failures: Vec<PersistError>,
}

impl PersistOutcome {
    /// Check if every category was written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes histogram files into a fixed run directory.
pub struct Persister {
    dir: PathBuf,
    names: Arc<dyn CategoryNames>,
    /// Resolved file path per category, fixed on first use.
    paths: HashMap<Category, PathBuf>,
    /// Lowercased stems already handed out.
    claimed: HashSet<String>,
    /// Reused render buffer.
    buf: String,
}

impl Persister {
    /// Create a persister writing into `dir`, which must already exist.
    pub fn new(dir: impl Into<PathBuf>, names: Arc<dyn CategoryNames>) -> Self {
        Self {
            dir: dir.into(),
            names,
            paths: HashMap::new(),
            claimed: HashSet::new(),
            buf: String::new(),
        }
    }

    /// Directory the files are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for a category.
    ///
    /// Every category gets its own file for the lifetime of the persister.
    /// When a name resolves to a stem another category already holds, the
    /// later category's stem gets `_<id>` appended.
    pub fn path_for(&mut self, category: Category) -> &Path {
        let Self {
            dir,
            names,
            paths,
            claimed,
            ..
        } = self;
        paths.entry(category).or_insert_with(|| {
            let stem = claim_stem(claimed, category, &names.name(category));
            dir.join(format!("{stem}.{HISTOGRAM_FILE_EXTENSION}"))
        })
    }

    /// Rewrite the file of every category in `store`.
    ///
    /// A failed category is logged and reported in the outcome; it never
    /// stops the remaining categories from being written.
    pub fn persist(&mut self, store: &HistogramStore) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();

        for (&category, histogram) in store {
            self.buf.clear();
            histogram.render_into(&mut self.buf);

            let path = self.path_for(category).to_path_buf();
            match write_atomic(&self.dir, &path, self.buf.as_bytes()) {
                Ok(()) => {
                    trace!(
                        category,
                        path = %path.display(),
                        buckets = histogram.len(),
                        "Histogram written"
                    );
                    outcome.files_written += 1;
                }
                Err(source) => {
                    warn!(
                        category,
                        path = %path.display(),
                        error = %source,
                        "Failed to write histogram file"
                    );
                    outcome.failures.push(PersistError {
                        category,
                        path,
                        source,
                    });
                }
            }
        }

        outcome
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("dir", &self.dir)
            .field("categories", &self.paths.len())
            .finish_non_exhaustive()
    }
}

/// Reserve a unique stem for `category`. Stems compare case-insensitively
/// so distinct categories never share a file on case-folding filesystems.
fn claim_stem(claimed: &mut HashSet<String>, category: Category, name: &str) -> String {
    let base = file_stem(category, name);
    let mut stem = base.clone();
    while !claimed.insert(stem.to_lowercase()) {
        stem = format!("{stem}_{category}");
    }

    if stem != base {
        warn!(
            category,
            name = %base,
            file_stem = %stem,
            "Histogram file name already taken, using a unique name"
        );
    }
    stem
}

/// Replace `path` with `contents` via a temp file in `dir`.
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
