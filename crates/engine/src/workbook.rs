//! In-memory spreadsheet grids exchanged with the xlsx reader/writer.
//!
//! The binary codec lives in the io crate; the engine only sees a sparse
//! `(row, col) -> Scalar` map per named sheet.

use std::collections::BTreeMap;

use crate::codec::GridCoordinate;
use crate::resolver::ResolvedCell;
use crate::value::Scalar;

/// Sparse cells of one spreadsheet sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetCells {
    cells: BTreeMap<(usize, usize), Scalar>,
}

impl SheetCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.cells.get(&(row, col))
    }

    pub fn get_at(&self, at: GridCoordinate) -> Option<&Scalar> {
        self.get(at.row, at.col)
    }

    /// Store a value; null clears the cell.
    pub fn set(&mut self, row: usize, col: usize, value: Scalar) {
        if value.is_null() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    pub fn set_at(&mut self, at: GridCoordinate, value: Scalar) {
        self.set(at.row, at.col, value);
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoordinate, &Scalar)> {
        self.cells.iter().map(|(&(row, col), v)| (GridCoordinate { row, col }, v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A workbook as an ordered list of named sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookGrid {
    sheets: Vec<(String, SheetCells)>,
}

impl WorkbookGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetCells> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Mutable sheet, appended if missing.
    pub fn sheet_mut(&mut self, name: &str) -> &mut SheetCells {
        let idx = match self.sheets.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.sheets.push((name.to_string(), SheetCells::new()));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx].1
    }

    pub fn insert_sheet(&mut self, name: impl Into<String>, cells: SheetCells) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = cells,
            None => self.sheets.push((name, cells)),
        }
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(n, _)| n.as_str())
    }

    pub fn sheets(&self) -> impl Iterator<Item = (&str, &SheetCells)> {
        self.sheets.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Cell lookup by sheet name.
    pub fn cell(&self, sheet: &str, row: usize, col: usize) -> Option<&Scalar> {
        self.sheet(sheet)?.get(row, col)
    }
}

/// Read the enterable cells of a sheet into storage keys. Blank cells are skipped.
pub fn read_sheet_values(cells: &[ResolvedCell], sheet: &SheetCells) -> BTreeMap<String, Scalar> {
    cells
        .iter()
        .filter(|c| c.is_enterable())
        .filter_map(|c| {
            let value = sheet.get_at(c.coordinate())?;
            if value.is_blank() {
                None
            } else {
                Some((c.storage_key(), value.clone()))
            }
        })
        .collect()
}

/// Write stored values of enterable cells to their coordinates. Blank values are skipped.
pub fn write_sheet_values(cells: &[ResolvedCell], data: &BTreeMap<String, Scalar>) -> SheetCells {
    let mut sheet = SheetCells::new();
    for cell in cells.iter().filter(|c| c.is_enterable()) {
        match data.get(&cell.storage_key()) {
            Some(value) if !value.is_blank() => sheet.set_at(cell.coordinate(), value.clone()),
            _ => {}
        }
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ValueType;

    fn cell(row_code: &str, col_code: Option<&str>, row: usize, col: usize, is_abstract: bool) -> ResolvedCell {
        ResolvedCell {
            row_code: row_code.into(),
            col_code: col_code.map(String::from),
            grid_row: row,
            grid_col: col,
            row_offset: 0,
            col_index: 0,
            is_abstract,
            indent_level: 0,
            label: String::new(),
            value_type: ValueType::String,
        }
    }

    #[test]
    fn sheet_cells_null_clears() {
        let mut sheet = SheetCells::new();
        sheet.set(1, 2, Scalar::from(5.0));
        assert_eq!(sheet.len(), 1);
        sheet.set(1, 2, Scalar::Null);
        assert!(sheet.is_empty());
    }

    #[test]
    fn workbook_sheets_keep_insertion_order() {
        let mut wb = WorkbookGrid::new();
        wb.sheet_mut("T0002").set(0, 0, Scalar::from("x"));
        wb.sheet_mut("index").set(1, 1, Scalar::from(2024.0));
        wb.sheet_mut("T0002").set(0, 1, Scalar::from("y"));
        assert_eq!(wb.sheet_names().collect::<Vec<_>>(), vec!["T0002", "index"]);
        assert_eq!(wb.cell("T0002", 0, 1), Some(&Scalar::from("y")));
        assert_eq!(wb.cell("missing", 0, 0), None);
    }

    #[test]
    fn abstract_and_blank_cells_do_not_round_trip() {
        let cells = vec![
            cell("A00", Some("c_this"), 9, 3, true),
            cell("A01", Some("c_this"), 10, 3, false),
            cell("A01", Some("c_prev"), 10, 4, false),
        ];
        let mut data = BTreeMap::new();
        data.insert("A00_c_this".to_string(), Scalar::from(1.0));
        data.insert("A01_c_this".to_string(), Scalar::from(100.0));
        data.insert("A01_c_prev".to_string(), Scalar::from("  "));

        let sheet = write_sheet_values(&cells, &data);
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.get(10, 3), Some(&Scalar::from(100.0)));

        let back = read_sheet_values(&cells, &sheet);
        assert_eq!(back.len(), 1);
        assert_eq!(back["A01_c_this"], Scalar::from(100.0));
    }
}
