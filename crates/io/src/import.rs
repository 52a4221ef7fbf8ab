//! Spreadsheet -> Bilancio.
//!
//! Workbook context (fiscal dates, identifier, currency) is resolved first,
//! then every sheet with a matching template is read through its resolved
//! cells. A sheet that fails is skipped and reported; the rest continue.

use std::path::Path;

use bilancio_engine::context::{resolve_context, ContextLocations};
use bilancio_engine::workbook::read_sheet_values;
use bilancio_engine::{Bilancio, Resolver, SheetCells, SheetLayout, TemplateError, TemplateSet, WorkbookGrid};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ExchangeError;
use crate::xlsx::read_workbook;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetStats {
    pub name: String,
    pub cells: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub sheets_imported: usize,
    pub cells_imported: usize,
    pub sheet_stats: Vec<SheetStats>,
    pub skipped: Vec<SkippedSheet>,
    /// At least one named range was found.
    pub context_resolved: bool,
}

impl ImportReport {
    fn skip(&mut self, sheet: &str, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("import: skipped sheet {}: {}", sheet, reason);
        self.skipped.push(SkippedSheet {
            sheet: sheet.to_string(),
            reason,
        });
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} sheet{}", self.sheets_imported, if self.sheets_imported == 1 { "" } else { "s" }),
            format!("{} cells", self.cells_imported),
        ];
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if !self.context_resolved {
            parts.push("no workbook context".to_string());
        }
        parts.join(" · ")
    }
}

/// Build a new Bilancio from a workbook grid.
pub fn import_workbook(
    workbook: &WorkbookGrid,
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    locations: &ContextLocations,
    now: DateTime<Utc>,
) -> (Bilancio, ImportReport) {
    let mut bilancio = Bilancio::new(now).with_sheets(templates.sheet_codes().iter().cloned());
    let mut report = ImportReport::default();

    let context = resolve_context(workbook, locations);
    report.context_resolved = !context.is_empty();
    context.apply_to(&mut bilancio.metadata);

    let reserved = locations.reserved_sheets();
    for (name, cells) in workbook.sheets() {
        if reserved.contains(&name) {
            continue;
        }
        if !templates.contains(name) {
            report.skip(name, "no template for this sheet");
            continue;
        }
        match import_sheet(templates, resolver, name, cells) {
            Ok(Some(values)) => {
                let count = values.len();
                bilancio.fogli.entry(name.to_string()).or_default().extend(values);
                report.sheets_imported += 1;
                report.cells_imported += count;
                report.sheet_stats.push(SheetStats {
                    name: name.to_string(),
                    cells: count,
                });
            }
            Ok(None) => report.skip(name, "sheet shape has no resolvable cells"),
            Err(e) => report.skip(name, e.to_string()),
        }
    }

    log::info!("import: {}", report.summary());
    (bilancio, report)
}

fn import_sheet(
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    name: &str,
    cells: &SheetCells,
) -> Result<Option<bilancio_engine::SheetData>, TemplateError> {
    let layout = SheetLayout::load(templates, name)?;
    let resolved = resolver.resolve_layout(&layout);
    if resolved.is_empty() && !layout.config.tipo_tab.is_supported() {
        return Ok(None);
    }
    Ok(Some(read_sheet_values(&resolved, cells)))
}

/// Read an xlsx (or any calamine format) file and import it.
pub fn import_file(
    path: &Path,
    templates: &TemplateSet,
    resolver: &Resolver<'_>,
    locations: &ContextLocations,
    now: DateTime<Utc>,
) -> Result<(Bilancio, ImportReport), ExchangeError> {
    let (workbook, unreadable) = read_workbook(path)?;
    let (bilancio, mut report) = import_workbook(&workbook, templates, resolver, locations, now);
    for sheet in unreadable {
        report.skip(&sheet.sheet, sheet.reason);
    }
    Ok((bilancio, report))
}
