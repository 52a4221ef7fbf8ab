//! Cell address resolution.
//!
//! Given a sheet's grid and configuration, enumerate every data position as
//! a [`ResolvedCell`]: row code, optional column code, grid coordinate and
//! display metadata. The same list drives rendering, edits, import and
//! export, so all address arithmetic lives here and in [`crate::codec`].

use serde::Serialize;

use crate::codec::{grid_coordinate, GridCoordinate};
use crate::config::{parse_config, ConfigRecord, SheetShape};
use crate::error::TemplateError;
use crate::grid::{DenseGrid, TemplateSet};
use crate::labels::{LabelMapping, ValueType};
use crate::title::{resolve_title, SheetTitle, TitlePolicy};

/// Conventional code of the entity-identification sheet.
pub const ENTITY_SHEET_CODE: &str = "T0000";
/// Column code marking a structurally absent cell.
pub const ABSENT_COLUMN: &str = "-";
/// Grid row holding the single free-text field's code.
pub const SINGLE_FIELD_CODE_ROW: usize = 2;
/// Offset from `first_col` of the single free-text field's code.
pub const SINGLE_FIELD_CODE_COL_OFFSET: usize = 3;

/// One resolved data position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCell {
    pub row_code: String,
    /// `None` for single-valued rows.
    pub col_code: Option<String>,
    pub grid_row: usize,
    pub grid_col: usize,
    /// Offset of the row within the data region.
    pub row_offset: usize,
    /// Position of the column within the data region (sentinel columns keep their slot).
    pub col_index: usize,
    pub is_abstract: bool,
    pub indent_level: usize,
    pub label: String,
    pub value_type: ValueType,
}

impl ResolvedCell {
    /// `row_code`, or `row_code_col_code` for composite cells.
    pub fn storage_key(&self) -> String {
        match &self.col_code {
            Some(col) => format!("{}_{}", self.row_code, col),
            None => self.row_code.clone(),
        }
    }

    pub fn coordinate(&self) -> GridCoordinate {
        GridCoordinate {
            row: self.grid_row,
            col: self.grid_col,
        }
    }

    /// Abstract rows are rendered but take no input and never round-trip.
    pub fn is_enterable(&self) -> bool {
        !self.is_abstract
    }
}

/// A template sheet ready for resolution.
#[derive(Debug, Clone)]
pub struct SheetLayout<'t> {
    pub code: String,
    pub grid: &'t DenseGrid,
    pub config: ConfigRecord,
}

impl<'t> SheetLayout<'t> {
    /// Materialize the sheet and parse its configuration header.
    pub fn load(templates: &'t TemplateSet, sheet_code: &str) -> Result<Self, TemplateError> {
        let grid = templates.get(sheet_code)?;
        let config = parse_config(sheet_code, grid)?;
        Ok(Self {
            code: sheet_code.to_string(),
            grid,
            config,
        })
    }
}

#[derive(Debug, Clone)]
struct RowCode {
    offset: usize,
    code: String,
    grid_label: String,
}

#[derive(Debug, Clone)]
struct ColumnCode {
    index: usize,
    code: String,
}

/// Resolves sheets against a label mapping.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    labels: &'a LabelMapping,
    entity_sheet: String,
    title_policy: TitlePolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(labels: &'a LabelMapping) -> Self {
        Self {
            labels,
            entity_sheet: ENTITY_SHEET_CODE.to_string(),
            title_policy: TitlePolicy::default(),
        }
    }

    pub fn with_entity_sheet(mut self, code: impl Into<String>) -> Self {
        self.entity_sheet = code.into();
        self
    }

    pub fn with_title_policy(mut self, policy: TitlePolicy) -> Self {
        self.title_policy = policy;
        self
    }

    pub fn labels(&self) -> &LabelMapping {
        self.labels
    }

    pub fn title_policy(&self) -> &TitlePolicy {
        &self.title_policy
    }

    pub fn title(&self, layout: &SheetLayout<'_>) -> SheetTitle {
        resolve_title(layout.grid, &layout.config, &layout.code, &self.title_policy)
    }

    pub fn resolve_layout(&self, layout: &SheetLayout<'_>) -> Vec<ResolvedCell> {
        self.resolve_cells(layout.grid, &layout.config, &layout.code)
    }

    /// Enumerate the sheet's cells in row-major order.
    ///
    /// The reserved shape (4) and unknown shapes resolve to an empty list;
    /// callers show a diagnostic instead of failing.
    pub fn resolve_cells(&self, grid: &DenseGrid, config: &ConfigRecord, sheet_code: &str) -> Vec<ResolvedCell> {
        match config.tipo_tab {
            SheetShape::Simple => self.resolve_simple(grid, config, sheet_code),
            SheetShape::Matrix => {
                let columns = column_codes(grid, config);
                if columns.is_empty() {
                    log::warn!("{sheet_code}: matrix sheet has no column codes");
                }
                self.emit_rows(grid, config, sheet_code, Some(&columns))
            }
            SheetShape::Tuple => {
                let columns = column_codes(grid, config);
                if config.nr_col == 1 || columns.is_empty() {
                    self.emit_rows(grid, config, sheet_code, None)
                } else {
                    self.emit_rows(grid, config, sheet_code, Some(&columns))
                }
            }
            SheetShape::Special => {
                log::debug!("{sheet_code}: tipo_tab 4 has no specified layout");
                Vec::new()
            }
            SheetShape::Unknown(code) => {
                log::warn!("{sheet_code}: unrecognized tipo_tab {code}, config {:?}", config.raw);
                Vec::new()
            }
        }
    }

    fn resolve_simple(&self, grid: &DenseGrid, config: &ConfigRecord, sheet_code: &str) -> Vec<ResolvedCell> {
        if config.is_single_field() {
            let code_col = config.first_col.saturating_add(SINGLE_FIELD_CODE_COL_OFFSET);
            let Some(code) = grid.get(SINGLE_FIELD_CODE_ROW, code_col).as_code() else {
                log::warn!(
                    "{sheet_code}: single field has no code at ({SINGLE_FIELD_CODE_ROW}, {code_col})"
                );
                return Vec::new();
            };
            let title = resolve_title(grid, config, sheet_code, &self.title_policy);
            return vec![self.decorate(sheet_code, config, code, None, 0, 0, title.text)];
        }

        let columns = column_codes(grid, config);
        if sheet_code == self.entity_sheet || config.nr_col <= 1 || columns.is_empty() {
            self.emit_rows(grid, config, sheet_code, None)
        } else {
            self.emit_rows(grid, config, sheet_code, Some(&columns))
        }
    }

    /// One cell per row (`columns = None`) or one per row and resolved column.
    fn emit_rows(
        &self,
        grid: &DenseGrid,
        config: &ConfigRecord,
        sheet_code: &str,
        columns: Option<&[ColumnCode]>,
    ) -> Vec<ResolvedCell> {
        let mut cells = Vec::new();
        for row in row_codes(grid, config) {
            match columns {
                None => cells.push(self.decorate(
                    sheet_code,
                    config,
                    row.code,
                    None,
                    row.offset,
                    0,
                    row.grid_label,
                )),
                Some(columns) => {
                    for column in columns {
                        cells.push(self.decorate(
                            sheet_code,
                            config,
                            row.code.clone(),
                            Some(column.code.clone()),
                            row.offset,
                            column.index,
                            row.grid_label.clone(),
                        ));
                    }
                }
            }
        }
        cells
    }

    #[allow(clippy::too_many_arguments)]
    fn decorate(
        &self,
        sheet_code: &str,
        config: &ConfigRecord,
        row_code: String,
        col_code: Option<String>,
        row_offset: usize,
        col_index: usize,
        fallback_label: String,
    ) -> ResolvedCell {
        let coordinate = grid_coordinate(config, row_offset, col_index);
        let entry = self.labels.lookup(sheet_code, &row_code);
        let label = entry
            .map(|e| e.label.clone())
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(fallback_label);

        ResolvedCell {
            row_code,
            col_code,
            grid_row: coordinate.row,
            grid_col: coordinate.col,
            row_offset,
            col_index,
            is_abstract: entry.is_some_and(|e| e.is_abstract),
            indent_level: entry.map_or(0, |e| e.indent_level),
            label,
            value_type: entry.map_or(ValueType::String, |e| e.value_type),
        }
    }
}

/// Convenience wrapper using the default entity sheet and title policy.
pub fn resolve_cells(
    grid: &DenseGrid,
    config: &ConfigRecord,
    sheet_code: &str,
    labels: &LabelMapping,
) -> Vec<ResolvedCell> {
    Resolver::new(labels).resolve_cells(grid, config, sheet_code)
}

/// Row codes of the data region, skipping rows without a code.
/// Rows past the end of the grid have no code and are not visited.
fn row_codes(grid: &DenseGrid, config: &ConfigRecord) -> Vec<RowCode> {
    let label_col = config.label_col();
    let rows = config.nr_row.min(grid.height().saturating_sub(config.first_row));
    (0..rows)
        .filter_map(|offset| {
            let row = config.first_row + offset;
            let code = grid.get(row, config.row_code_nrcol).as_code()?;
            let grid_label = grid
                .get(row, label_col)
                .as_text()
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            Some(RowCode { offset, code, grid_label })
        })
        .collect()
}

/// Column codes: the two context codes for a two-column sheet, otherwise read
/// positionally from the column-code row. Empty and `-` columns are dropped.
fn column_codes(grid: &DenseGrid, config: &ConfigRecord) -> Vec<ColumnCode> {
    if config.nr_col == 2 {
        let [c1, c2] = config.temporal_codes();
        return vec![ColumnCode { index: 0, code: c1 }, ColumnCode { index: 1, code: c2 }];
    }
    let cols = config.nr_col.min(grid.width().saturating_sub(config.first_col));
    (0..cols)
        .filter_map(|index| {
            let code = grid
                .get(config.col_code_nrrow, config.first_col + index)
                .as_code()?;
            if code == ABSENT_COLUMN {
                return None;
            }
            Some(ColumnCode { index, code })
        })
        .collect()
}
