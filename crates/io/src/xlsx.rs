// Excel exchange: read any workbook calamine opens (xlsx, xls, xlsb, ods)
// into a sparse grid per sheet; write grids back out as xlsx.
//
// Only cell values travel. Formatting, formulas and layout are not part of
// the Bilancio model.

use std::collections::HashSet;
use std::path::Path;

use bilancio_engine::{Scalar, SheetCells, WorkbookGrid};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};

use crate::error::ExchangeError;
use crate::import::SkippedSheet;

/// Largest row/column rust_xlsxwriter accepts (0-based).
const MAX_ROW: usize = 1_048_575;
const MAX_COL: usize = 16_383;

/// True when (row, col) is addressable in an xlsx worksheet.
pub fn fits_xlsx(row: usize, col: usize) -> bool {
    row <= MAX_ROW && col <= MAX_COL
}

/// Read every sheet's values. Dates come back as serial numbers.
///
/// A sheet calamine cannot read is left out and listed in the second element;
/// the other sheets are still returned.
pub fn read_workbook(path: &Path) -> Result<(WorkbookGrid, Vec<SkippedSheet>), ExchangeError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ExchangeError::Spreadsheet(format!("failed to open {}: {}", path.display(), e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ExchangeError::Spreadsheet(format!(
            "{} contains no sheets",
            path.display()
        )));
    }

    let mut grid = WorkbookGrid::new();
    let mut skipped = Vec::new();
    for sheet_name in &sheet_names {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("failed to read sheet '{}': {}", sheet_name, e);
                skipped.push(SkippedSheet {
                    sheet: sheet_name.clone(),
                    reason: format!("unreadable: {e}"),
                });
                continue;
            }
        };

        // Ranges start at the first used cell, not at A1.
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut cells = SheetCells::new();
        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let Some(value) = data_to_scalar(cell) else { continue };
                cells.set(start_row as usize + row_idx, start_col as usize + col_idx, value);
            }
        }
        log::debug!("read sheet {} ({} cells)", sheet_name, cells.len());
        grid.insert_sheet(sheet_name.clone(), cells);
    }
    Ok((grid, skipped))
}

fn data_to_scalar(cell: &Data) -> Option<Scalar> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Scalar::Text(s.clone())),
        Data::Float(n) => Some(Scalar::Number(*n)),
        Data::Int(n) => Some(Scalar::Number(*n as f64)),
        Data::Bool(b) => Some(Scalar::Bool(*b)),
        // 1900 date system assumed.
        Data::DateTime(dt) => Some(Scalar::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Scalar::Text(s.clone())),
        Data::Error(e) => Some(Scalar::Text(format!("#{:?}", e))),
    }
}

/// What [`write_workbook`] put in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookWrite {
    pub cells: usize,
    /// Sheets left out of the file, with the reason.
    pub skipped: Vec<SkippedSheet>,
}

/// Write all sheets as typed cells: numbers stay numeric, text is text.
///
/// A sheet that can't be represented (bad name, cell outside the xlsx grid)
/// is left out and reported; only a failed save is an error.
pub fn write_workbook(grid: &WorkbookGrid, path: &Path) -> Result<WorkbookWrite, ExchangeError> {
    let mut xlsx_workbook = XlsxWorkbook::new();
    let mut result = WorkbookWrite::default();
    let mut names = HashSet::new();

    for (name, cells) in grid.sheets() {
        // Excel sheet names are case-insensitive.
        if !names.insert(name.to_lowercase()) {
            skip_sheet(&mut result, name, "duplicate sheet name".to_string());
            continue;
        }
        match build_worksheet(name, cells) {
            Ok((worksheet, written)) => {
                xlsx_workbook.push_worksheet(worksheet);
                result.cells += written;
            }
            Err(reason) => skip_sheet(&mut result, name, reason),
        }
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| ExchangeError::Spreadsheet(format!("failed to save {}: {}", path.display(), e)))?;
    log::info!("wrote {} cells to {}", result.cells, path.display());
    Ok(result)
}

fn skip_sheet(result: &mut WorkbookWrite, name: &str, reason: String) {
    log::warn!("xlsx: left out sheet {}: {}", name, reason);
    result.skipped.push(SkippedSheet {
        sheet: name.to_string(),
        reason,
    });
}

fn build_worksheet(name: &str, cells: &SheetCells) -> Result<(Worksheet, usize), String> {
    if let Some((at, _)) = cells.iter().find(|(at, _)| !fits_xlsx(at.row, at.col)) {
        return Err(format!("{} is outside the xlsx grid", at.a1()));
    }

    let mut worksheet = Worksheet::new();
    worksheet
        .set_name(name)
        .map_err(|e| format!("invalid sheet name: {e}"))?;

    let mut written = 0;
    for (at, value) in cells.iter() {
        let (row32, col16) = (at.row as u32, at.col as u16);
        let result = match value {
            Scalar::Null => continue,
            Scalar::Number(n) => worksheet.write_number(row32, col16, *n),
            Scalar::Text(s) => worksheet.write_string(row32, col16, s),
            Scalar::Bool(b) => worksheet.write_boolean(row32, col16, *b),
        };
        result.map_err(|e| format!("failed to write {}: {}", at.a1(), e))?;
        written += 1;
    }
    Ok((worksheet, written))
}
