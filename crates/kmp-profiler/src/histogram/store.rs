//! Exact per-millisecond latency histograms.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{self, Write};

use crate::ingest::Sample;
use crate::Category;

/// Frequency table from latency bucket (ms) to occurrence count.
///
/// Every distinct millisecond value gets its own bucket; there is no
/// binning. Buckets iterate in ascending order, which is the order the
/// on-disk format requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    buckets: BTreeMap<i64, u64>,
}

impl Histogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one observation of `latency_ms`.
    pub fn observe(&mut self, latency_ms: i64) {
        *self.buckets.entry(latency_ms).or_insert(0) += 1;
    }

    /// Count for a single bucket (0 if never observed).
    pub fn count(&self, latency_ms: i64) -> u64 {
        self.buckets.get(&latency_ms).copied().unwrap_or(0)
    }

    /// Total observations across all buckets.
    pub fn total(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Number of populated buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate `(bucket, count)` in ascending bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.buckets.iter().map(|(&bucket, &count)| (bucket, count))
    }

    /// Append the file body (`"<bucket> <count>\n"` per bucket) to `out`.
    pub fn render_into(&self, out: &mut String) {
        for (bucket, count) in self.iter() {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{bucket} {count}");
        }
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bucket, count) in self.iter() {
            writeln!(f, "{bucket} {count}")?;
        }
        Ok(())
    }
}

/// All histograms of a run, keyed by category.
///
/// Owned by the flush worker. Nothing else writes to it, so it carries no
/// synchronization of its own.
#[derive(Debug, Clone, Default)]
pub struct HistogramStore {
    categories: BTreeMap<Category, Histogram>,
}

impl HistogramStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into its category's histogram.
    pub fn fold(&mut self, sample: Sample) {
        self.categories
            .entry(sample.category)
            .or_default()
            .observe(sample.latency_ms);
    }

    /// Fold every sample from `samples`, returning how many were folded.
    pub fn fold_all<I>(&mut self, samples: I) -> u64
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut folded = 0u64;
        for sample in samples {
            self.fold(sample);
            folded += 1;
        }
        folded
    }

    /// Histogram for a category, if any sample of it was folded.
    pub fn get(&self, category: Category) -> Option<&Histogram> {
        self.categories.get(&category)
    }

    /// Number of categories seen so far.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Check if no sample has been folded yet.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Iterate categories in ascending id order.
    pub fn iter(&self) -> btree_map::Iter<'_, Category, Histogram> {
        self.categories.iter()
    }
}

impl<'a> IntoIterator for &'a HistogramStore {
    type Item = (&'a Category, &'a Histogram);
    type IntoIter = btree_map::Iter<'a, Category, Histogram>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
