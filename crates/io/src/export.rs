//! Bilancio -> spreadsheet.
//!
//! Runs the resolver in the opposite direction to import: every stored value
//! of an enterable cell lands on the coordinate import reads it from. The
//! metadata goes to the index sheet's input locations.

use std::path::Path;

use bilancio_engine::context::{context_cells, ContextLocations};
use bilancio_engine::workbook::write_sheet_values;
use bilancio_engine::{Bilancio, Resolver, SheetData, SheetLayout, TemplateError, TemplateSet, WorkbookGrid};
use serde::Serialize;

use crate::error::ExchangeError;
use crate::import::SkippedSheet;
use crate::xlsx::{fits_xlsx, write_workbook};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub sheets_exported: usize,
    pub cells_exported: usize,
    /// Stored keys with no cell in the current template (left out).
    pub stale_keys: usize,
    pub skipped: Vec<SkippedSheet>,
}

impl ExportReport {
    fn skip(&mut self, sheet: &str, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("export: skipped sheet {}: {}", sheet, reason);
        self.skipped.push(SkippedSheet {
            sheet: sheet.to_string(),
            reason,
        });
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} sheet{}", self.sheets_exported, if self.sheets_exported == 1 { "" } else { "s" }),
            format!("{} cells", self.cells_exported),
        ];
        if self.stale_keys > 0 {
            parts.push(format!("{} stale keys left out", self.stale_keys));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        parts.join(" · ")
    }
}

pub fn export_bilancio(
    bilancio: &Bilancio,
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    locations: &ContextLocations,
) -> (WorkbookGrid, ExportReport) {
    let mut workbook = WorkbookGrid::new();
    let mut report = ExportReport::default();

    for (sheet_code, data) in &bilancio.fogli {
        if !templates.contains(sheet_code) {
            report.skip(sheet_code, "no template for this sheet");
            continue;
        }
        match export_sheet(templates, resolver, sheet_code, data, bilancio) {
            Ok((cells, _)) if cells.iter().any(|(at, _)| !fits_xlsx(at.row, at.col)) => {
                report.skip(sheet_code, "template places cells outside the xlsx grid");
            }
            Ok((cells, stale)) => {
                if stale > 0 {
                    log::warn!("export: {} has {} stale keys", sheet_code, stale);
                }
                report.stale_keys += stale;
                report.cells_exported += cells.len();
                report.sheets_exported += 1;
                workbook.insert_sheet(sheet_code.clone(), cells);
            }
            Err(e) => report.skip(sheet_code, e.to_string()),
        }
    }

    for (location, value) in context_cells(&bilancio.metadata, locations) {
        workbook.sheet_mut(&location.sheet).set(location.row, location.col, value);
    }

    log::info!("export: {}", report.summary());
    (workbook, report)
}

fn export_sheet(
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    sheet_code: &str,
    data: &SheetData,
    bilancio: &Bilancio,
) -> Result<(bilancio_engine::SheetCells, usize), TemplateError> {
    let layout = SheetLayout::load(templates, sheet_code)?;
    let resolved = resolver.resolve_layout(&layout);
    let stale = bilancio.stale_keys(sheet_code, &resolved).len();
    Ok((write_sheet_values(&resolved, data), stale))
}

/// Export and write an xlsx file.
pub fn export_file(
    bilancio: &Bilancio,
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    locations: &ContextLocations,
    path: &Path,
) -> Result<ExportReport, ExchangeError> {
    let (workbook, mut report) = export_bilancio(bilancio, templates, resolver, locations);
    let written = write_workbook(&workbook, path)?;
    for left_out in written.skipped {
        if bilancio.fogli.contains_key(&left_out.sheet) {
            let cells = workbook.sheet(&left_out.sheet).map_or(0, |s| s.len());
            report.cells_exported = report.cells_exported.saturating_sub(cells);
            report.sheets_exported = report.sheets_exported.saturating_sub(1);
        }
        report.skip(&left_out.sheet, left_out.reason);
    }
    Ok(report)
}
