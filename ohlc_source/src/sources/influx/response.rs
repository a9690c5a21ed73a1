//! Decoding of Flux CSV query results.
//!
//! The query API streams one CSV table per result table. Tables are separated
//! by an empty line and each starts with its own header row; annotation rows
//! (`#datatype`, `#group`, `#default`) are skipped.

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use snafu::OptionExt;
use tracing::warn;

use crate::{
    models::bar::{Bar, OhlcField, PartialBar},
    sources::{ParseSnafu, SourceError},
};

/// One data row keyed by column name.
pub type Record = IndexMap<String, String>;

/// Splits one CSV line, honouring double-quoted cells with `""` escapes.
pub fn split_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

/// Groups physical lines into CSV rows, joining lines while a quoted cell is
/// still open. Each row carries the 1-based line number it starts on.
fn logical_lines(body: &str) -> Vec<(usize, String)> {
    let mut rows = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (i, raw) in body.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let (start, text) = match pending.take() {
            Some((start, mut text)) => {
                text.push('\n');
                text.push_str(line);
                (start, text)
            }
            None => (i + 1, line.to_string()),
        };
        // `""` escapes come in pairs, so an odd count means an open quote
        if text.matches('"').count() % 2 == 1 {
            pending = Some((start, text));
        } else {
            rows.push((start, text));
        }
    }
    rows.extend(pending);
    rows
}

/// Parses every table of a CSV body into records.
pub fn parse_records(body: &str) -> Result<Vec<Record>, SourceError> {
    let mut records = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for (lineno, line) in logical_lines(body) {
        let line = line.as_str();
        if line.trim().is_empty() {
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let cells = split_line(line);
        let Some(columns) = header.as_ref() else {
            header = Some(cells);
            continue;
        };

        if cells.len() != columns.len() {
            return ParseSnafu {
                message: format!(
                    "line {}: expected {} cells, found {}",
                    lineno,
                    columns.len(),
                    cells.len()
                ),
            }
            .fail();
        }

        let record: Record = columns.iter().cloned().zip(cells).collect();
        if let Some(err) = record.get("error").filter(|e| !e.is_empty()) {
            return ParseSnafu {
                message: format!("query failed: {err}"),
            }
            .fail();
        }
        records.push(record);
    }

    Ok(records)
}

fn column<'a>(record: &'a Record, name: &str) -> Result<&'a str, SourceError> {
    record.get(name).map(String::as_str).context(ParseSnafu {
        message: format!("missing column {name}"),
    })
}

/// Extracts the distinct `_value` cells of a `schema.tagValues` result.
pub fn tag_values(body: &str) -> Result<Vec<String>, SourceError> {
    let mut values = IndexSet::new();
    for record in parse_records(body)? {
        let value = column(&record, "_value")?;
        if !value.is_empty() {
            values.insert(value.to_string());
        }
    }
    Ok(values.into_iter().collect())
}

/// Pivots field-per-row OHLC results into bars keyed by `(_time, broker)`.
///
/// Bars missing any price, or carrying a price that is not a finite number,
/// are dropped.
pub fn pivot_bars(body: &str) -> Result<Vec<Bar>, SourceError> {
    let mut pivot: IndexMap<(DateTime<Utc>, String), PartialBar> = IndexMap::new();

    for record in parse_records(body)? {
        let Some(field) = OhlcField::from_name(column(&record, "_field")?) else {
            continue;
        };
        let time_raw = column(&record, "_time")?;
        let timestamp = DateTime::parse_from_rfc3339(time_raw)
            .map_err(|e| {
                ParseSnafu {
                    message: format!("bad _time {time_raw:?}: {e}"),
                }
                .build()
            })?
            .with_timezone(&Utc);
        let broker = column(&record, "broker")?.to_string();

        pivot
            .entry((timestamp, broker))
            .or_default()
            .set(field, column(&record, "_value")?);
    }

    let total = pivot.len();
    let bars: Vec<Bar> = pivot
        .into_iter()
        .filter_map(|((timestamp, broker), partial)| partial.complete(timestamp, broker))
        .collect();

    if bars.len() < total {
        warn!(dropped = total - bars.len(), kept = bars.len(), "dropped incomplete OHLC rows");
    }
    Ok(bars)
}
