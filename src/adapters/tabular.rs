//! Single-column readers and writers for xlsx and csv files.

use crate::domain::model::{FailedRecord, Record};
use crate::domain::ports::TableFormat;
use crate::utils::error::{EtlError, Result};
use std::io::Cursor;

/// Name of the worksheet created by `umya_spreadsheet::new_file`.
const DEFAULT_SHEET: &str = "Sheet1";

/// Cleans a cell's text: trims whitespace and drops the `.0` that numeric
/// cells pick up after passing through a float.
pub fn normalize_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(integer) if !integer.is_empty() && integer.bytes().all(|b| b.is_ascii_digit()) => {
            integer.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// A number of exactly fourteen digits may be a fifteen-digit identifier
/// whose leading zero the spreadsheet dropped.
fn may_have_lost_leading_zero(numeric: bool, value: &str) -> bool {
    numeric && value.len() == 14 && value.bytes().all(|b| b.is_ascii_digit())
}

fn header_matches(cell: &str, column: &str) -> bool {
    cell.trim_start_matches('\u{feff}').trim() == column.trim()
}

/// Reads the values of `column` from a table, one [`Record`] per data row.
pub fn read_column(
    data: &[u8],
    format: TableFormat,
    column: &str,
    sheet: Option<&str>,
) -> Result<Vec<Record>> {
    match format {
        TableFormat::Csv => read_csv_column(data, column),
        TableFormat::Xlsx => read_xlsx_column(data, column, sheet),
    }
}

fn read_csv_column(data: &[u8], column: &str) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let position = headers
        .iter()
        .position(|h| header_matches(h, column))
        .ok_or_else(|| EtlError::SourceFormat {
            message: format!(
                "column '{}' not found in csv header [{}]",
                column,
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        })?;

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let value = row.get(position).map(normalize_cell).unwrap_or_default();
        // Record position, not line: quoted fields may span lines
        records.push(Record {
            row_number: index + 2,
            value,
        });
    }

    tracing::debug!("Read {} rows from csv column '{}'", records.len(), column);
    Ok(records)
}

fn read_xlsx_column(data: &[u8], column: &str, sheet: Option<&str>) -> Result<Vec<Record>> {
    let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(data), true).map_err(
        |e| EtlError::SourceFormat {
            message: format!("not a readable xlsx workbook: {}", e),
        },
    )?;

    let worksheet = match sheet {
        Some(name) => book
            .get_sheet_by_name(name)
            .ok_or_else(|| EtlError::SourceFormat {
                message: format!("sheet '{}' not found", name),
            })?,
        None => book
            .get_sheet_collection()
            .first()
            .ok_or_else(|| EtlError::SourceFormat {
                message: "workbook has no sheets".to_string(),
            })?,
    };

    let max_col = worksheet.get_highest_column();
    let max_row = worksheet.get_highest_row();

    let col = (1..=max_col)
        .find(|&c| {
            worksheet
                .get_cell((c, 1u32))
                .map(|cell| header_matches(&cell.get_value(), column))
                .unwrap_or(false)
        })
        .ok_or_else(|| EtlError::SourceFormat {
            message: format!(
                "column '{}' not found in header row of sheet '{}'",
                column,
                worksheet.get_name()
            ),
        })?;

    let cell_text = |c: u32, r: u32| {
        worksheet
            .get_cell((c, r))
            .map(|cell| normalize_cell(&cell.get_value()))
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    for row in 2..=max_row {
        // Styled but empty rows still count towards the highest row
        if (1..=max_col).all(|c| cell_text(c, row).is_empty()) {
            continue;
        }
        let value = cell_text(col, row);
        let numeric = worksheet
            .get_cell((col, row))
            .map(|cell| cell.get_data_type() == "n")
            .unwrap_or(false);
        if may_have_lost_leading_zero(numeric, &value) {
            tracing::warn!(
                "Row {}: numeric cell {} has 14 digits; a leading zero may have been lost, store identifiers as text",
                row,
                value
            );
        }
        records.push(Record {
            row_number: row as usize,
            value,
        });
    }

    tracing::debug!(
        "Read {} rows from sheet '{}' column '{}'",
        records.len(),
        worksheet.get_name(),
        column
    );
    Ok(records)
}

/// Writes `values` as a one-column table headed by `header`.
pub fn write_column<S: AsRef<str>>(format: TableFormat, header: &str, values: &[S]) -> Result<Vec<u8>> {
    match format {
        TableFormat::Csv => write_csv_column(header, values),
        TableFormat::Xlsx => write_xlsx_column(header, values),
    }
}

fn write_csv_column<S: AsRef<str>>(header: &str, values: &[S]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([header])?;
    for value in values {
        writer.write_record([value.as_ref()])?;
    }
    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}

fn write_xlsx_column<S: AsRef<str>>(header: &str, values: &[S]) -> Result<Vec<u8>> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut(DEFAULT_SHEET)
        .ok_or_else(|| EtlError::SpreadsheetError {
            message: format!("new workbook is missing '{}'", DEFAULT_SHEET),
        })?;

    sheet.get_cell_mut((1u32, 1u32)).set_value(header);
    for (index, value) in values.iter().enumerate() {
        // Text cells keep leading zeros and all fifteen digits
        sheet
            .get_cell_mut((1u32, index as u32 + 2))
            .set_value_string(value.as_ref());
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buffer).map_err(|e| {
        EtlError::SpreadsheetError {
            message: e.to_string(),
        }
    })?;
    Ok(buffer.into_inner())
}

/// Failure report: `row,index,value,reason`.
pub fn write_failure_report(failed: &[FailedRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in failed {
        writer.serialize(record)?;
    }
    if failed.is_empty() {
        writer.write_record(["row", "index", "value", "reason"])?;
    }
    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}
