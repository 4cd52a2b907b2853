use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Column name every record is tagged with.
pub const IIN_COLUMN: &str = "iin";

/// Failure taxonomy of a lookup run.
///
/// Per-identifier timeouts are deliberately absent: the client treats them as
/// a definitive "no data" for that identifier and they never escape it.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid IIN {0:?}: expected exactly 12 digits")]
    InvalidIin(String),

    /// The automated browser session could not start. Fatal to the whole run.
    #[error("browser session could not start: {0}")]
    SessionInit(#[source] anyhow::Error),

    /// Anything unexpected during the interaction sequence. Propagated with
    /// full detail rather than silently recovered.
    #[error("automation failure: {0}")]
    Automation(#[source] anyhow::Error),
}

/// A validated 12-digit national identification number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iin(String);

impl Iin {
    /// Accepts exactly 12 ASCII digits (surrounding whitespace tolerated).
    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let trimmed = raw.trim();
        if trimmed.len() == 12 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(LookupError::InvalidIin(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transient snapshot of the currently rendered results table: header cell
/// texts plus row cell texts. Overwritten on each query, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Content hash used for stale-table detection: a snapshot hashing equal
    /// to the pre-submit baseline must never be attributed to a newly
    /// submitted identifier.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Hash of an optional snapshot. An absent wrapper hashes like a rendered
/// table with no content, which is the correct baseline for both.
pub fn snapshot_hash(snapshot: Option<&RawTable>) -> u64 {
    match snapshot {
        Some(table) => table.content_hash(),
        None => RawTable::default().content_hash(),
    }
}

/// Rectangular, column-named output table. Cells are JSON values: strings for
/// debtor fields, booleans for pivoted arrest flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Concatenate per-identifier record sets into one. Columns are unioned
    /// in first-seen order; cells missing from a source set become `Null`.
    pub fn concat<I: IntoIterator<Item = RecordSet>>(sets: I) -> RecordSet {
        let mut columns: Vec<String> = Vec::new();
        let mut staged: Vec<RecordSet> = Vec::new();
        for set in sets {
            if set.rows.is_empty() {
                continue;
            }
            for column in &set.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
            staged.push(set);
        }

        let mut rows = Vec::new();
        for set in staged {
            let index: Vec<usize> = set
                .columns
                .iter()
                .map(|c| {
                    columns
                        .iter()
                        .position(|u| u == c)
                        .expect("column present in union")
                })
                .collect();
            for row in set.rows {
                let mut out = vec![Value::Null; columns.len()];
                for (j, cell) in row.into_iter().enumerate() {
                    out[index[j]] = cell;
                }
                rows.push(out);
            }
        }

        RecordSet { columns, rows }
    }

    /// Drop rows where every non-`iin` cell is empty. These are duplicate or
    /// placeholder rows introduced by pivoting and rendering quirks.
    pub fn retain_non_empty_rows(&mut self) {
        let value_cols: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() != IIN_COLUMN)
            .map(|(i, _)| i)
            .collect();
        if value_cols.is_empty() {
            self.rows.clear();
            return;
        }
        self.rows
            .retain(|row| value_cols.iter().any(|&i| !cell_is_empty(&row[i])));
    }

    /// Rows as an array of `{column: value}` objects for JSON output.
    pub fn to_json_records(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let mut obj = serde_json::Map::new();
                    for (column, cell) in self.columns.iter().zip(row) {
                        obj.insert(column.clone(), cell.clone());
                    }
                    Value::Object(obj)
                })
                .collect(),
        )
    }
}

fn cell_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn iin_accepts_exactly_twelve_digits() {
        assert!(Iin::parse("123456789012").is_ok());
        assert!(Iin::parse(" 123456789012 ").is_ok());
        assert!(matches!(
            Iin::parse("12345"),
            Err(LookupError::InvalidIin(_))
        ));
        assert!(matches!(
            Iin::parse("1234567890123"),
            Err(LookupError::InvalidIin(_))
        ));
        assert!(matches!(
            Iin::parse("12345678901a"),
            Err(LookupError::InvalidIin(_))
        ));
        assert!(matches!(Iin::parse(""), Err(LookupError::InvalidIin(_))));
    }

    #[test]
    fn content_hash_tracks_cell_text() {
        let a = RawTable {
            headers: vec!["A".into()],
            rows: vec![vec!["1".into()]],
        };
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        b.rows[0][0] = "2".into();
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(snapshot_hash(None), RawTable::default().content_hash());
    }

    #[test]
    fn retain_drops_rows_with_only_iin_content() {
        let mut set = RecordSet {
            columns: vec![IIN_COLUMN.into(), "category".into()],
            rows: vec![
                vec![json!("123456789012"), json!("Алименты")],
                vec![json!("123456789012"), json!("")],
                vec![json!("123456789012"), Value::Null],
            ],
        };
        set.retain_non_empty_rows();
        assert_eq!(set.len(), 1);
        assert_eq!(set.rows[0][1], json!("Алименты"));
    }

    #[test]
    fn concat_unions_columns_in_first_seen_order() {
        let a = RecordSet {
            columns: vec!["iin".into(), "x".into()],
            rows: vec![vec![json!("1"), json!("a")]],
        };
        let b = RecordSet {
            columns: vec!["iin".into(), "y".into()],
            rows: vec![vec![json!("2"), json!("b")]],
        };
        let out = RecordSet::concat([a, b]);
        assert_eq!(out.columns, vec!["iin", "x", "y"]);
        assert_eq!(out.rows[0], vec![json!("1"), json!("a"), Value::Null]);
        assert_eq!(out.rows[1], vec![json!("2"), Value::Null, json!("b")]);
    }
}
