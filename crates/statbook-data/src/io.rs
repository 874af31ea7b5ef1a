//! Reading and writing record tables
//!
//! Two formats are supported:
//!
//! - **Delimited text** (CSV by default): the first line holds column names.
//!   A column named `idx` becomes the row identifier; without one, rows are
//!   numbered from 1. Columns whose present values all parse as numbers are
//!   numeric, every other column is categorical; [`read_delimited_with`]
//!   keeps named columns categorical regardless, for codes such as `sex`
//!   stored as 0/1. Empty cells and `NA` mark an absent value.
//! - **JSON**: an array of [`Record`] objects.
//!
//! # Examples
//!
//! ```
//! use statbook_data::io;
//!
//! let csv = "idx,sex,weight\n1,F,61.5\n2,M,NA\n";
//! let table = io::read_delimited(csv.as_bytes(), b',').unwrap();
//!
//! assert_eq!(table.rows()[0].category("sex"), Some("F"));
//! assert_eq!(table.rows()[0].numeric("weight"), Some(61.5));
//! assert_eq!(table.rows()[1].numeric("weight"), None);
//! ```

use std::io::{Read, Write};

use crate::record::{ColumnKind, Record, RecordTable, TableError};

/// Name of the identifier column in delimited files.
pub const ID_COLUMN: &str = "idx";

/// Marker written for absent values.
pub const MISSING_VALUE: &str = "NA";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum LoadError {
    #[display("failed to read delimited data")]
    Delimited(#[error(source)] csv::Error),
    #[display("failed to read JSON data")]
    Json(#[error(source)] serde_json::Error),
    #[display("line {line}: invalid row identifier {value:?}")]
    InvalidId { line: u64, value: String },
    #[display("invalid record table")]
    Table(#[error(source)] TableError),
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SaveError {
    #[display("failed to write delimited data")]
    Delimited(#[error(source)] csv::Error),
    #[display("failed to write JSON data")]
    Json(#[error(source)] serde_json::Error),
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == MISSING_VALUE
}

/// Reads a record table from delimited text.
pub fn read_delimited<R>(reader: R, delimiter: u8) -> Result<RecordTable, LoadError>
where
    R: Read,
{
    read_delimited_with::<_, &str>(reader, delimiter, &[])
}

/// Reads a record table from delimited text, keeping the `categorical`
/// columns categorical even when their values are numbers.
pub fn read_delimited_with<R, S>(
    reader: R,
    delimiter: u8,
    categorical: &[S],
) -> Result<RecordTable, LoadError>
where
    R: Read,
    S: AsRef<str>,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().map_err(LoadError::Delimited)?.clone();
    let lines = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(LoadError::Delimited)?;

    let id_position = headers.iter().position(|name| name == ID_COLUMN);
    let numeric = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            !categorical.iter().any(|c| c.as_ref() == name)
                && lines
                    .iter()
                    .filter_map(|line| line.get(i))
                    .filter(|value| !is_missing(value))
                    .all(|value| value.parse::<f64>().is_ok())
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(lines.len());
    for (n, line) in (1..).zip(&lines) {
        let line_number = line.position().map_or(n, |pos| pos.line());
        let idx = match id_position {
            Some(pos) => {
                let value = line.get(pos).unwrap_or_default();
                value.parse().map_err(|_| LoadError::InvalidId {
                    line: line_number,
                    value: value.to_owned(),
                })?
            }
            None => n,
        };

        let mut record = Record::new(idx);
        for (i, (name, value)) in headers.iter().zip(line.iter()).enumerate() {
            if Some(i) == id_position || is_missing(value) {
                continue;
            }
            if numeric[i] {
                // all present values were checked above
                if let Ok(number) = value.parse() {
                    record.numeric.insert(name.to_owned(), number);
                }
            } else {
                record.categorical.insert(name.to_owned(), value.to_owned());
            }
        }
        rows.push(record);
    }

    log::debug!(
        "read {} rows with {} columns from delimited data",
        rows.len(),
        headers.len()
    );
    RecordTable::new(rows).map_err(LoadError::Table)
}

/// Writes a record table as delimited text.
///
/// The identifier column comes first, followed by [`RecordTable::columns`].
/// Absent values are written as `NA`.
pub fn write_delimited<W>(table: &RecordTable, writer: W, delimiter: u8) -> Result<(), SaveError>
where
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let columns = table.columns();
    let header = std::iter::once(ID_COLUMN).chain(columns.iter().map(|c| c.name.as_str()));
    writer.write_record(header).map_err(SaveError::Delimited)?;

    for row in table {
        let mut fields = Vec::with_capacity(columns.len() + 1);
        fields.push(row.idx.to_string());
        for column in columns {
            let value = match column.kind {
                ColumnKind::Categorical => row.category(&column.name).map(str::to_owned),
                ColumnKind::Numeric => row.numeric(&column.name).map(|v| v.to_string()),
            };
            fields.push(value.unwrap_or_else(|| MISSING_VALUE.to_owned()));
        }
        writer.write_record(&fields).map_err(SaveError::Delimited)?;
    }

    writer
        .flush()
        .map_err(|e| SaveError::Delimited(e.into()))?;
    Ok(())
}

/// Reads a record table from a JSON array of records.
pub fn read_json<R>(reader: R) -> Result<RecordTable, LoadError>
where
    R: Read,
{
    let rows: Vec<Record> = serde_json::from_reader(reader).map_err(LoadError::Json)?;
    RecordTable::new(rows).map_err(LoadError::Table)
}

/// Writes a record table as a pretty-printed JSON array of records.
pub fn write_json<W>(table: &RecordTable, writer: W) -> Result<(), SaveError>
where
    W: Write,
{
    serde_json::to_writer_pretty(writer, table).map_err(SaveError::Json)
}
