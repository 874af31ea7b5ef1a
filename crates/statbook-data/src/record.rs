//! Record tables
//!
//! A [`RecordTable`] is an ordered, non-empty sequence of [`Record`]s with
//! unique identifiers. Each record carries categorical attributes (e.g. `sex`)
//! and numeric attributes (e.g. `weight`, `bmi`, `heart_disease`).
//!
//! Tables are immutable: derived columns are attached by building a new table
//! with [`RecordTable::with_flag_column`].
//!
//! # Examples
//!
//! ```
//! use statbook_data::record::{Record, RecordTable};
//!
//! let table = RecordTable::new(vec![
//!     Record::new(1).with_category("sex", "F").with_numeric("weight", 61.5),
//!     Record::new(2).with_category("sex", "M").with_numeric("weight", 82.0),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.numeric_column("weight").unwrap(), vec![61.5, 82.0]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// A single row of a record table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique row identifier
    pub idx: u64,
    /// Categorical attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categorical: BTreeMap<String, String>,
    /// Numeric attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numeric: BTreeMap<String, f64>,
}

impl Record {
    #[must_use]
    pub fn new(idx: u64) -> Self {
        Self {
            idx,
            categorical: BTreeMap::new(),
            numeric: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }
}

/// Kind of values stored under a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TableError {
    #[display("record table is empty")]
    Empty,
    #[display("duplicate row identifier {idx}")]
    DuplicateId { idx: u64 },
    #[display("column {column:?} holds both categorical and numeric values")]
    MixedColumn { column: String },
    #[display("column {column:?} already exists")]
    DuplicateColumn { column: String },
    #[display("column {column:?} not found")]
    UnknownColumn { column: String },
    #[display("row {idx} has no {kind:?} value for column {column:?}")]
    MissingValue {
        idx: u64,
        column: String,
        kind: ColumnKind,
    },
    #[display("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// An ordered, validated collection of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Record>", into = "Vec<Record>")]
pub struct RecordTable {
    rows: Vec<Record>,
    columns: Vec<Column>,
}

impl RecordTable {
    /// Validates the rows and builds a table.
    ///
    /// Fails when `rows` is empty, when identifiers repeat, or when a column
    /// name is used for categorical values in one row and numeric values in
    /// another.
    pub fn new(rows: Vec<Record>) -> Result<Self, TableError> {
        if rows.is_empty() {
            return Err(TableError::Empty);
        }

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.idx) {
                return Err(TableError::DuplicateId { idx: row.idx });
            }
        }

        let categorical = rows
            .iter()
            .flat_map(|row| row.categorical.keys())
            .collect::<BTreeSet<_>>();
        let numeric = rows
            .iter()
            .flat_map(|row| row.numeric.keys())
            .collect::<BTreeSet<_>>();
        if let Some(column) = categorical.intersection(&numeric).next() {
            return Err(TableError::MixedColumn {
                column: (*column).clone(),
            });
        }

        let columns = categorical
            .into_iter()
            .map(|name| Column {
                name: name.clone(),
                kind: ColumnKind::Categorical,
            })
            .chain(numeric.into_iter().map(|name| Column {
                name: name.clone(),
                kind: ColumnKind::Numeric,
            }))
            .collect();

        Ok(Self { rows, columns })
    }

    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.rows.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always `false`; tables are non-empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns present in at least one row: categorical first, then numeric,
    /// each group sorted by name.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.kind)
    }

    /// Returns the values of a numeric column, failing on the first row
    /// without a value.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, TableError> {
        self.rows
            .iter()
            .map(|row| {
                row.numeric(name).ok_or_else(|| TableError::MissingValue {
                    idx: row.idx,
                    column: name.to_owned(),
                    kind: ColumnKind::Numeric,
                })
            })
            .collect()
    }

    /// Returns the values of a categorical column, failing on the first row
    /// without a value.
    pub fn categorical_column(&self, name: &str) -> Result<Vec<&str>, TableError> {
        self.rows
            .iter()
            .map(|row| {
                row.category(name).ok_or_else(|| TableError::MissingValue {
                    idx: row.idx,
                    column: name.to_owned(),
                    kind: ColumnKind::Categorical,
                })
            })
            .collect()
    }

    /// Builds a new table with a boolean column appended as categorical
    /// `"true"`/`"false"` values, aligned with row order.
    pub fn with_flag_column(&self, name: &str, flags: &[bool]) -> Result<Self, TableError> {
        if flags.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                expected: self.rows.len(),
                actual: flags.len(),
            });
        }
        if self.column_kind(name).is_some() {
            return Err(TableError::DuplicateColumn {
                column: name.to_owned(),
            });
        }
        let rows = self
            .rows
            .iter()
            .zip(flags)
            .map(|(row, flag)| row.clone().with_category(name, flag.to_string()))
            .collect();
        Self::new(rows)
    }
}

impl TryFrom<Vec<Record>> for RecordTable {
    type Error = TableError;

    fn try_from(rows: Vec<Record>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<RecordTable> for Vec<Record> {
    fn from(table: RecordTable) -> Self {
        table.rows
    }
}

impl<'a> IntoIterator for &'a RecordTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RecordTable {
        RecordTable::new(vec![
            Record::new(1)
                .with_category("sex", "F")
                .with_numeric("weight", 60.0),
            Record::new(2)
                .with_category("sex", "M")
                .with_numeric("weight", 80.0),
            Record::new(3).with_category("sex", "F"),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(RecordTable::new(vec![]), Err(TableError::Empty));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = RecordTable::new(vec![Record::new(7), Record::new(7)]).unwrap_err();
        assert_eq!(err, TableError::DuplicateId { idx: 7 });
    }

    #[test]
    fn test_rejects_mixed_column() {
        let err = RecordTable::new(vec![
            Record::new(1).with_category("x", "a"),
            Record::new(2).with_numeric("x", 1.0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TableError::MixedColumn {
                column: "x".to_owned()
            }
        );
    }

    #[test]
    fn test_columns() {
        let table = sample_table();
        assert_eq!(table.column_kind("sex"), Some(ColumnKind::Categorical));
        assert_eq!(table.column_kind("weight"), Some(ColumnKind::Numeric));
        assert_eq!(table.column_kind("bmi"), None);
        let names = table
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["sex", "weight"]);
    }

    #[test]
    fn test_numeric_column_reports_missing_row() {
        let err = sample_table().numeric_column("weight").unwrap_err();
        assert_eq!(
            err,
            TableError::MissingValue {
                idx: 3,
                column: "weight".to_owned(),
                kind: ColumnKind::Numeric,
            }
        );
    }

    #[test]
    fn test_categorical_column() {
        let table = sample_table();
        assert_eq!(table.categorical_column("sex").unwrap(), ["F", "M", "F"]);
    }

    #[test]
    fn test_with_flag_column() {
        let table = sample_table();
        let flagged = table
            .with_flag_column("is_missing", &[true, false, true])
            .unwrap();
        assert_eq!(
            flagged.categorical_column("is_missing").unwrap(),
            ["true", "false", "true"]
        );
        // original untouched
        assert_eq!(table.column_kind("is_missing"), None);

        assert!(matches!(
            table.with_flag_column("is_missing", &[true]),
            Err(TableError::LengthMismatch {
                expected: 3,
                actual: 1
            })
        ));
        assert!(matches!(
            table.with_flag_column("sex", &[true, true, true]),
            Err(TableError::DuplicateColumn { .. })
        ));
    }
}
