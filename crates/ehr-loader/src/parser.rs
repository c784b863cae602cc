//! Tab-delimited row pipeline.
//!
//! Raw lines are split into records, validated against a canonical schema
//! and permuted into canonical column order, then filtered or grouped by a
//! key column. Rows are plain [`csv::StringRecord`]s throughout; no field is
//! trimmed or coerced here.

use std::collections::{BTreeSet, HashMap};

use csv::StringRecord;

use crate::types::{LoaderError, LoaderResult};

/// Trait for types that can be built from a canonical row.
///
/// Implement this trait for each input table.
pub trait EhrRecord: Sized {
    /// Canonical column order for this table.
    const EXPECTED_COLUMNS: &'static [&'static str];

    /// Builds a value from a row already permuted into canonical order.
    fn from_record(record: &StringRecord) -> LoaderResult<Self>;
}

/// Rows sharing one key value, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// The key value shared by every row.
    pub key: String,
    /// Rows with the key, truncated to the retained columns.
    pub rows: Vec<StringRecord>,
}

/// Splits raw lines into tab-separated records.
///
/// Whitespace is stripped from both ends of each whole line before
/// splitting; individual fields are left alone. Ragged lines are kept as-is,
/// so the output always has one record per input line.
pub fn split_lines<S: AsRef<str>>(lines: &[S]) -> Vec<StringRecord> {
    lines
        .iter()
        .map(|line| line.as_ref().trim().split('\t').collect::<StringRecord>())
        .collect()
}

/// Permutes every row into the order given by `expected_columns`.
///
/// The first row is the header. Its names must be exactly the set of
/// `expected_columns`, in any order. The returned rows still include the
/// (now canonical) header; callers drop it.
///
/// A header that repeats a name is rejected even when its set of names
/// matches, since the repeated column would be ambiguous.
///
/// # Errors
/// - [`LoaderError::EmptyInput`] if there is no header row.
/// - [`LoaderError::DuplicateColumn`] if the header repeats a name.
/// - [`LoaderError::SchemaMismatch`] if the header and expected sets differ.
/// - [`LoaderError::RowTooShort`] if a row lacks a needed field.
pub fn reorder_columns<S: AsRef<str>>(
    expected_columns: &[S],
    rows: &[StringRecord],
) -> LoaderResult<Vec<StringRecord>> {
    let header = rows.first().ok_or(LoaderError::EmptyInput)?;

    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(header.len());
    for (index, name) in header.iter().enumerate() {
        if positions.insert(name, index).is_some() {
            return Err(LoaderError::DuplicateColumn {
                column: name.to_string(),
            });
        }
    }

    let expected: BTreeSet<&str> = expected_columns.iter().map(AsRef::as_ref).collect();
    let found: BTreeSet<&str> = positions.keys().copied().collect();
    if expected != found {
        return Err(LoaderError::SchemaMismatch {
            missing: expected.difference(&found).map(|c| c.to_string()).collect(),
            unexpected: found.difference(&expected).map(|c| c.to_string()).collect(),
        });
    }

    let order: Vec<usize> = expected_columns
        .iter()
        .filter_map(|column| positions.get(column.as_ref() as &str).copied())
        .collect();
    let last = order.iter().copied().max().unwrap_or(0);

    rows.iter()
        .enumerate()
        .map(|(row_number, row)| {
            if !order.is_empty() && row.len() <= last {
                return Err(LoaderError::RowTooShort {
                    row: row_number,
                    width: row.len(),
                    required: last,
                });
            }
            Ok(order.iter().map(|&index| &row[index]).collect::<StringRecord>())
        })
        .collect()
}

/// Returns rows whose field at `check_index` equals `filter_value`.
///
/// Each returned row is truncated to `row[column_index..]`, which drops the
/// leading join columns once grouping is done. A `column_index` past the end
/// of a row yields an empty record.
///
/// # Errors
/// Returns [`LoaderError::RowTooShort`] if any row has no field at
/// `check_index`, whether or not it would have matched.
pub fn filter_rows(
    rows: &[StringRecord],
    filter_value: &str,
    check_index: usize,
    column_index: usize,
) -> LoaderResult<Vec<StringRecord>> {
    let mut matched = Vec::new();
    for (row_number, row) in rows.iter().enumerate() {
        if key_at(row, row_number, check_index)? == filter_value {
            matched.push(slice_from(row, column_index));
        }
    }
    Ok(matched)
}

/// Partitions rows by the value at `key_index`.
///
/// Groups come back in the order their key first appears, and rows keep
/// their input order within a group. Rows are truncated as in
/// [`filter_rows`].
///
/// # Errors
/// Returns [`LoaderError::RowTooShort`] if any row has no field at
/// `key_index`.
pub fn group_rows(
    rows: &[StringRecord],
    key_index: usize,
    column_index: usize,
) -> LoaderResult<Vec<RowGroup>> {
    let mut groups: Vec<RowGroup> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for (row_number, row) in rows.iter().enumerate() {
        let key = key_at(row, row_number, key_index)?;
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(RowGroup {
                key: key.to_string(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(slice_from(row, column_index));
    }

    Ok(groups)
}

fn key_at(row: &StringRecord, row_number: usize, index: usize) -> LoaderResult<&str> {
    row.get(index).ok_or(LoaderError::RowTooShort {
        row: row_number,
        width: row.len(),
        required: index,
    })
}

fn slice_from(row: &StringRecord, column_index: usize) -> StringRecord {
    row.iter().skip(column_index).collect()
}
