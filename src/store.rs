//! In-memory table for one record kind.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Record;

/// Ordered rows of one entity type. Insertion order is preserved and no field
/// is unique, so duplicate names are allowed.
///
/// Readers never see a half-applied mutation: every operation holds the lock
/// for its whole duration, and [`RecordStore::snapshot`] hands out a copy.
#[derive(Debug)]
pub struct RecordStore<R> {
    rows: RwLock<Vec<R>>,
}

impl<R: Record> RecordStore<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Append a record. The new row is always last.
    pub fn add(&self, record: R) {
        self.write().push(record);
    }

    /// Remove the row at `index`, keeping the relative order of the rest.
    pub fn remove_at(&self, index: usize) -> Result<R> {
        let mut rows = self.write();
        if index >= rows.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: rows.len(),
            });
        }
        Ok(rows.remove(index))
    }

    /// Remove several rows at once. Indices are processed highest first so
    /// earlier removals never shift later ones; the removed records come back
    /// in that same descending order. Nothing is removed if any index is out of
    /// range.
    pub fn remove_many(&self, indices: &BTreeSet<usize>) -> Result<Vec<R>> {
        let mut rows = self.write();
        if let Some(&highest) = indices.iter().next_back() {
            if highest >= rows.len() {
                return Err(Error::IndexOutOfRange {
                    index: highest,
                    len: rows.len(),
                });
            }
        }

        let removed: Vec<R> = indices.iter().rev().map(|&index| rows.remove(index)).collect();
        debug!(removed = removed.len(), remaining = rows.len(), "removed rows");
        Ok(removed)
    }

    /// Swap in a whole new sequence of rows.
    pub fn replace_all(&self, records: Vec<R>) {
        *self.write() = records;
    }

    /// Immutable copy of the current rows.
    pub fn snapshot(&self) -> Vec<R> {
        self.read().clone()
    }

    /// Copies of the rows at `indices`, skipping any that no longer exist.
    pub fn pick(&self, indices: &BTreeSet<usize>) -> Vec<R> {
        let rows = self.read();
        indices.iter().filter_map(|&index| rows.get(index).cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<R>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<R>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Record> Default for RecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
