//! Category to file-name resolution.
//!
//! The profiler only ever sees numeric categories. Human readable names are
//! supplied by the host (usually the message-type enum of the wire protocol)
//! and are looked up once per category per flush cycle.

use std::collections::HashMap;

use crate::Category;

/// Resolves a category to the display name used for its histogram file.
pub trait CategoryNames: Send + Sync {
    /// Name for the given category. Must be deterministic for a run.
    fn name(&self, category: Category) -> String;
}

impl<F> CategoryNames for F
where
    F: Fn(Category) -> String + Send + Sync,
{
    fn name(&self, category: Category) -> String {
        self(category)
    }
}

/// Names categories by their decimal id.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericNames;

impl CategoryNames for NumericNames {
    fn name(&self, category: Category) -> String {
        category.to_string()
    }
}

/// Fixed name table with a numeric fallback for unknown categories.
#[derive(Debug, Clone, Default)]
pub struct NamedCategories {
    names: HashMap<Category, String>,
}

impl NamedCategories {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name for a category.
    pub fn with_name(mut self, category: Category, name: impl Into<String>) -> Self {
        self.names.insert(category, name.into());
        self
    }

    /// Number of named categories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no categories are named.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(Category, String)> for NamedCategories {
    fn from_iter<I: IntoIterator<Item = (Category, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl CategoryNames for NamedCategories {
    fn name(&self, category: Category) -> String {
        self.names
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.to_string())
    }
}

/// Turn a resolved name into a single safe path component.
///
/// Separators and NUL become `_`; names that would escape or alias the run
/// directory (`""`, `"."`, `".."`) fall back to the numeric id.
pub(crate) fn file_stem(category: Category, name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match stem.trim() {
        "" | "." | ".." => category.to_string(),
        _ => stem,
    }
}
