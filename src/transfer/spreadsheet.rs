use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

use crate::error::{PhraseError, Result};

use super::records::Table;

const SHEET_NAME: &str = "Phrases";

pub fn encode(table: &Table) -> Result<Vec<u8>> {
    let export_error = |e: rust_xlsxwriter::XlsxError| PhraseError::Export(format!("xlsx: {}", e));

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(export_error)?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .map_err(export_error)?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(row_idx as u32 + 1, col as u16, value)
                .map_err(export_error)?;
        }
    }

    workbook.save_to_buffer().map_err(export_error)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Read the first worksheet.
pub fn decode(bytes: &[u8]) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| PhraseError::validation(format!("unreadable xlsx file: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PhraseError::validation("xlsx file has no worksheets"))?
        .map_err(|e| PhraseError::validation(format!("unreadable worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| cell_text(c).trim().to_string()).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Ok(Table {
        headers,
        rows,
        unreadable: Vec::new(),
    })
}
