//! Table extraction and normalization.
//!
//! Pure functions over captured wrapper HTML and `RawTable` values, so the
//! whole reshape pipeline is testable offline against fixture HTML.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::core::types::{Iin, RawTable, RecordSet, IIN_COLUMN};

use super::spec::PageSpec;

/// Parse the captured wrapper HTML into a raw table.
///
/// Expects the site's `thead`/`tbody` structure. Rows whose cell count does
/// not match the header count are discarded as malformed (partial renders,
/// colspan placeholder rows).
pub fn parse_table(html: &str) -> Option<RawTable> {
    let document = Html::parse_fragment(html);
    let header_sel = Selector::parse("thead th").ok()?;
    let row_sel = Selector::parse("tbody tr").ok()?;
    let cell_sel = Selector::parse("td").ok()?;

    let headers: Vec<String> = document
        .select(&header_sel)
        .map(|th| th.text().collect::<String>().trim().to_string())
        .collect();
    if headers.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for tr in document.select(&row_sel) {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cells.len() == headers.len() {
            rows.push(cells);
        }
    }

    Some(RawTable { headers, rows })
}

/// Reshape one identifier's raw table into records: optional pivot, column
/// rename, duplicate removal, then the `iin` tag as the first column.
pub fn normalize(raw: &RawTable, spec: &PageSpec, iin: &Iin) -> RecordSet {
    let (columns, rows) = match spec.pivot_column {
        Some(pivot) if raw.headers.iter().any(|h| h == pivot) => pivot_boolean(raw, pivot),
        _ => passthrough(raw),
    };

    let renamed: Vec<String> = columns
        .iter()
        .map(|c| spec.rename_column(c).to_string())
        .collect();

    // Duplicate rows collapse to the first occurrence.
    let mut seen = HashSet::new();
    let mut deduped: Vec<Vec<Value>> = Vec::new();
    for row in rows {
        let key = serde_json::to_string(&row).unwrap_or_default();
        if seen.insert(key) {
            deduped.push(row);
        }
    }

    let mut out_columns = Vec::with_capacity(renamed.len() + 1);
    out_columns.push(IIN_COLUMN.to_string());
    out_columns.extend(renamed);

    let out_rows = deduped
        .into_iter()
        .map(|mut row| {
            row.insert(0, Value::String(iin.to_string()));
            row
        })
        .collect();

    RecordSet {
        columns: out_columns,
        rows: out_rows,
    }
}

fn passthrough(raw: &RawTable) -> (Vec<String>, Vec<Vec<Value>>) {
    let rows = raw
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| Value::String(cell.clone())).collect())
        .collect();
    (raw.headers.clone(), rows)
}

/// Transpose rows keyed by `pivot` into boolean columns: the pivot cell of
/// each source row becomes a column name, and each remaining source column
/// becomes one output row of flags. For the arrests page that is a single
/// status column, so one identifier collapses to exactly one row.
fn pivot_boolean(raw: &RawTable, pivot: &str) -> (Vec<String>, Vec<Vec<Value>>) {
    let pivot_idx = raw
        .headers
        .iter()
        .position(|h| h == pivot)
        .expect("pivot column checked by caller");

    let mut columns: Vec<String> = Vec::new();
    for row in &raw.rows {
        let name = row[pivot_idx].clone();
        if !columns.contains(&name) {
            columns.push(name);
        }
    }

    let value_cols: Vec<usize> = (0..raw.headers.len()).filter(|&i| i != pivot_idx).collect();

    let mut rows = Vec::with_capacity(value_cols.len());
    for &vc in &value_cols {
        let mut out = vec![Value::Bool(false); columns.len()];
        for row in &raw.rows {
            if let Some(ci) = columns.iter().position(|c| c == &row[pivot_idx]) {
                out[ci] = Value::Bool(flag_value(&row[vc]));
            }
        }
        rows.push(out);
    }

    (columns, rows)
}

/// "Да" and "Нет" map to true/false; any other non-empty text coerces to
/// true, matching the original register's loose status rendering.
fn flag_value(cell: &str) -> bool {
    match cell.trim() {
        "Да" => true,
        "Нет" => false,
        other => !other.is_empty(),
    }
}
