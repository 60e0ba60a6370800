//! Tabular sources rendered as aligned plain-text tables.
//!
//! Both CSV files and spreadsheet sheets end up in [`render_table`]: the
//! header line followed by one line per row, every column right-aligned to
//! its widest value, no row index.

use std::path::Path;

use super::{read_bytes, ExtractError, Extractor};

/// Column separator in rendered tables.
const GAP: &str = "  ";

/// `.csv`: first record is the header. Ragged rows are accepted.
pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        csv_text(&read_bytes(path)?)
    }
}

pub fn csv_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .byte_headers()
        .map_err(|e| ExtractError::Tabular(e.to_string()))?
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ExtractError::Tabular(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect::<Vec<_>>(),
        );
    }

    if header.iter().all(|h| h.is_empty()) && rows.is_empty() {
        return Ok(String::new());
    }
    Ok(render_table(&header, &rows))
}

/// Renders `header` and `rows` with right-aligned columns.
///
/// Rows shorter than the widest row are padded with empty cells. Trailing
/// whitespace is trimmed from every line.
pub fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let cell = |row: &[String], i: usize| -> String {
        row.get(i)
            .map(|v| v.replace(['\r', '\n'], " "))
            .unwrap_or_default()
    };

    let all_rows: Vec<Vec<String>> = std::iter::once(header)
        .chain(rows.iter().map(|r| r.as_slice()))
        .map(|row| (0..columns).map(|i| cell(row, i)).collect())
        .collect();

    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            all_rows
                .iter()
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    all_rows
        .iter()
        .map(|row| {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(value, width)| format!("{:>width$}", value, width = *width))
                .collect::<Vec<_>>()
                .join(GAP);
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
