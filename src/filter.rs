//! Column search over a table's rows.
//!
//! Matching is plain case-insensitive substring containment. User text is never
//! compiled as a pattern, so characters like `(` or `*` match themselves.

use crate::error::ValidationError;
use crate::models::{Column, Record};

/// Indices of the rows whose selected column contains `pattern`, ignoring case.
/// Indices come back in ascending order and `rows` is left untouched.
pub fn filter<R, F>(
    rows: &[R],
    column_selector: F,
    pattern: &str,
) -> Result<Vec<usize>, ValidationError>
where
    F: Fn(&R) -> &str,
{
    if pattern.is_empty() {
        return Err(ValidationError::EmptyPattern);
    }

    let needle = pattern.to_lowercase();
    Ok(rows
        .iter()
        .enumerate()
        .filter(|(_, row)| column_selector(row).to_lowercase().contains(&needle))
        .map(|(index, _)| index)
        .collect())
}

/// The identity filter: every index of a table with `len` rows.
pub fn all_indices(len: usize) -> Vec<usize> {
    (0..len).collect()
}

/// Search currently applied to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFilter<C> {
    pub column: C,
    pub pattern: String,
}

/// Remembers the active search for one table so the visible rows can be
/// recomputed after the table changes.
#[derive(Debug, Clone)]
pub struct TableFilter<R: Record> {
    active: Option<ActiveFilter<R::Column>>,
}

impl<R: Record> Default for TableFilter<R> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<R: Record> TableFilter<R> {
    /// Apply a new search. A rejected pattern leaves the previous one in place.
    pub fn search(
        &mut self,
        rows: &[R],
        column: R::Column,
        pattern: &str,
    ) -> Result<Vec<usize>, ValidationError> {
        let visible = filter(rows, |row| row.field(column), pattern)?;
        self.active = Some(ActiveFilter {
            column,
            pattern: pattern.to_string(),
        });
        Ok(visible)
    }

    /// Drop the active search; every row becomes visible again.
    pub fn reset(&mut self, rows: &[R]) -> Vec<usize> {
        self.active = None;
        all_indices(rows.len())
    }

    /// Re-run the active search (if any) against the given rows.
    pub fn visible(&self, rows: &[R]) -> Vec<usize> {
        match &self.active {
            Some(active) => filter(rows, |row| row.field(active.column), &active.pattern)
                .unwrap_or_else(|_| all_indices(rows.len())),
            None => all_indices(rows.len()),
        }
    }

    pub fn active(&self) -> Option<&ActiveFilter<R::Column>> {
        self.active.as_ref()
    }
}

/// Resolve a criterion name to a column, for error reporting by the caller.
pub(crate) fn resolve_column<R: Record>(criterion: &str) -> Result<R::Column, ValidationError> {
    R::Column::parse(criterion).ok_or_else(|| ValidationError::UnknownCriterion {
        entity: R::ENTITY,
        criterion: criterion.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudentColumn, StudentRecord, TeacherColumn, TeacherRecord};

    fn teachers() -> Vec<TeacherRecord> {
        vec![
            TeacherRecord::new("Anna Smirnova", "Mathematics", "5A, 6B"),
            TeacherRecord::new("Boris Orlov", "Physics", "9A"),
            TeacherRecord::new("ANNA KARPOVA", "Math", "7C"),
            TeacherRecord::new("Olga (acting)", "Art", "5A"),
        ]
    }

    #[test]
    fn matches_substring_ignoring_case() {
        let rows = teachers();
        let hits = filter(&rows, |t| t.field(TeacherColumn::FullName), "anna").unwrap();
        assert_eq!(hits, [0, 2]);
        let hits = filter(&rows, |t| t.field(TeacherColumn::Subject), "MATH").unwrap();
        assert_eq!(hits, [0, 2]);
    }

    #[test]
    fn searches_only_the_selected_column() {
        let rows = teachers();
        let hits = filter(&rows, |t| t.field(TeacherColumn::Classes), "5a").unwrap();
        assert_eq!(hits, [0, 3]);
        let hits = filter(&rows, |t| t.field(TeacherColumn::FullName), "5a").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn pattern_characters_are_literal() {
        let rows = teachers();
        let hits = filter(&rows, |t| t.field(TeacherColumn::FullName), "(acting").unwrap();
        assert_eq!(hits, [3]);
        let hits = filter(&rows, |t| t.field(TeacherColumn::FullName), ".*").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn non_ascii_text_folds_case() {
        let rows = vec![StudentRecord::new("Иванов Пётр", "5А", "отлично")];
        let hits = filter(&rows, |s| s.field(StudentColumn::FullName), "ИВАНОВ").unwrap();
        assert_eq!(hits, [0]);
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let rows = teachers();
        let err = filter(&rows, |t| t.field(TeacherColumn::FullName), "").unwrap_err();
        assert_eq!(err, ValidationError::EmptyPattern);
    }

    #[test]
    fn table_filter_follows_edits() {
        let mut rows = teachers();
        let mut table = TableFilter::<TeacherRecord>::default();
        assert_eq!(table.search(&rows, TeacherColumn::FullName, "anna").unwrap(), [0, 2]);

        rows.push(TeacherRecord::new("Anna Lee", "History", "8B"));
        assert_eq!(table.visible(&rows), [0, 2, 4]);

        assert_eq!(table.reset(&rows), [0, 1, 2, 3, 4]);
        assert!(table.active().is_none());
    }

    #[test]
    fn rejected_search_keeps_previous_filter() {
        let rows = teachers();
        let mut table = TableFilter::<TeacherRecord>::default();
        table.search(&rows, TeacherColumn::Subject, "phys").unwrap();
        assert!(table.search(&rows, TeacherColumn::Subject, "").is_err());
        assert_eq!(table.visible(&rows), [1]);
    }

    #[test]
    fn unknown_criterion_is_reported() {
        let err = resolve_column::<StudentRecord>("Subject").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownCriterion { .. }));
        assert_eq!(resolve_column::<StudentRecord>("Performance").unwrap(), StudentColumn::Performance);
    }
}
