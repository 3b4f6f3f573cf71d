//! Workbook output.
//!
//! Produces a single-sheet `.xlsx` with a bold header row.

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::format::{Cell, Table};

pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Errors from building a workbook.
#[derive(Debug, thiserror::Error)]
pub enum XlsxError {
    #[error(transparent)]
    Writer(#[from] rust_xlsxwriter::XlsxError),
    #[error("Table does not fit in a worksheet")]
    TooLarge,
}

fn position(row: usize, col: usize) -> Result<(u32, u16), XlsxError> {
    let row = u32::try_from(row).map_err(|_| XlsxError::TooLarge)?;
    let col = u16::try_from(col).map_err(|_| XlsxError::TooLarge)?;
    Ok((row, col))
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::Empty => {}
        Cell::Text(text) => {
            sheet.write_string(row, col, text.as_str())?;
        }
        Cell::Number(n) => {
            sheet.write_number(row, col, *n)?;
        }
        Cell::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
    }
    Ok(())
}

/// Write a table as an `.xlsx` workbook.
pub fn write_workbook(table: &Table) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (index, name) in table.headers.iter().enumerate() {
        let (row, col) = position(0, index)?;
        sheet.write_string_with_format(row, col, name.as_str(), &header)?;
    }

    for (row_index, cells) in table.rows.iter().enumerate() {
        for (col_index, cell) in cells.iter().enumerate() {
            let (row, col) = position(row_index + 1, col_index)?;
            write_cell(sheet, row, col, cell)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
