//! Inventory ingestion from spreadsheet rows.
//!
//! Each row is a JSON object mapping column names to cell values. Only
//! rows counted in `kolli` are used; the item size is read from the
//! product name (`"... 250 ml ..."`) and the quantity from `Antal`.
//!
//! Uploaded `.xlsx` workbooks are turned into such rows first: the first
//! row of the first sheet names the columns, empty cells become `""` and
//! blank rows are skipped.

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx, XlsxError, open_workbook_from_rs};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::model::InventoryCounts;
use crate::types::ItemSize;

pub const UNIT_COLUMN: &str = "Enhed";
pub const NAME_COLUMN: &str = "Navn";
pub const QUANTITY_COLUMN: &str = "Antal";

/// Unit value (case-insensitive) marking rows that count packed units.
const PACKED_UNIT: &str = "kolli";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Row {row} is not an object of column values")]
    MalformedRow { row: usize },
    #[error("Could not read workbook: {0}")]
    Workbook(String),
    #[error("Workbook contains no sheets")]
    NoSheet,
}

impl From<XlsxError> for IngestError {
    fn from(err: XlsxError) -> Self {
        IngestError::Workbook(err.to_string())
    }
}

/// Sums per-size quantities over all rows.
///
/// Rows with another unit or without a recognizable size are skipped.
pub fn counts_from_rows(rows: &[Value]) -> Result<InventoryCounts, IngestError> {
    let mut totals = [0.0_f64; 4];

    for (idx, row) in rows.iter().enumerate() {
        let row = row
            .as_object()
            .ok_or(IngestError::MalformedRow { row: idx + 1 })?;

        if cell_text(row, UNIT_COLUMN).trim().to_lowercase() != PACKED_UNIT {
            continue;
        }
        let Some(size) = size_from_name(&cell_text(row, NAME_COLUMN)) else {
            continue;
        };

        let quantity = cell_number(row.get(QUANTITY_COLUMN));
        if quantity.is_finite() {
            totals[size_slot(size)] += quantity;
        }
    }

    Ok(InventoryCounts::from_raw(
        ItemSize::ALL.into_iter().zip(totals),
    ))
}

fn size_slot(size: ItemSize) -> usize {
    match size {
        ItemSize::Ml60 => 0,
        ItemSize::Ml250 => 1,
        ItemSize::Ml340 => 2,
        ItemSize::Ml750 => 3,
    }
}

/// Finds the first `<size> ml` mention in a product name.
///
/// Matches are leftmost; at each position the sizes are tried in
/// canonical order. Whitespace between number and unit is optional.
pub fn size_from_name(name: &str) -> Option<ItemSize> {
    let lowered = name.to_lowercase();
    lowered.char_indices().find_map(|(pos, _)| {
        let rest = &lowered[pos..];
        ItemSize::ALL.into_iter().find(|size| {
            rest.strip_prefix(size.label())
                .map(|tail| tail.trim_start().starts_with("ml"))
                .unwrap_or(false)
        })
    })
}

/// Reads the first sheet of an `.xlsx` workbook into rows.
pub fn rows_from_xlsx(bytes: &[u8]) -> Result<Vec<Value>, IngestError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(IngestError::NoSheet)??;
    Ok(rows_from_range(&range))
}

/// Converts a sheet into one object per data row, keyed by the header row.
///
/// Columns with an empty header are dropped.
pub fn rows_from_range(range: &Range<Data>) -> Vec<Value> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let columns: Vec<Option<String>> = header
        .iter()
        .map(|cell| {
            let name = cell.to_string();
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();

    rows.filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            let object: Map<String, Value> = columns
                .iter()
                .zip(row)
                .filter_map(|(column, cell)| {
                    column.as_ref().map(|name| (name.clone(), sheet_cell(cell)))
                })
                .collect();
            Value::Object(object)
        })
        .collect()
}

fn sheet_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(text) => Value::String(text.clone()),
        Data::Int(number) => Value::from(*number),
        Data::Float(number) => Number::from_f64(*number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(flag) => Value::Bool(*flag),
        other => Value::String(other.to_string()),
    }
}

fn cell_text(row: &Map<String, Value>, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Numeric value of a quantity cell; anything unparsable counts as 0.
fn cell_number(cell: Option<&Value>) -> f64 {
    match cell {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(0.0)
            }
        }
        Some(_) => 0.0,
    }
}


/// Minimal `.xlsx` writer for tests: inline strings and numeric cells only.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Lager" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    /// Builds a one-sheet workbook. Cells that parse as numbers are stored as numbers.
    pub(crate) fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", char::from(b'A' + c as u8), r + 1);
                if cell.parse::<f64>().is_ok() {
                    sheet.push_str(&format!(r#"<c r="{reference}"><v>{cell}</v></c>"#));
                } else {
                    sheet.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(cell)
                    ));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ];

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(name, options).expect("zip entry");
            writer.write_all(content.as_bytes()).expect("zip write");
        }
        writer.finish().expect("zip finish").into_inner()
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}
