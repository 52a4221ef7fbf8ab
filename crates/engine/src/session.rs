//! Edit session over one Bilancio.
//!
//! The session owns the statement being edited and borrows the immutable
//! template set and resolver. Every accepted edit bumps a revision counter;
//! persistence is the caller's business (see the io crate's autosave
//! debouncer).

use std::fmt;

use serde::Serialize;

use crate::bilancio::{Bilancio, BilancioStats};
use crate::codec::{column_headers, validate_value, DisplayContext, DisplayValue, ValidationOutcome};
use crate::config::SheetShape;
use crate::error::TemplateError;
use crate::grid::TemplateSet;
use crate::resolver::{ResolvedCell, Resolver, SheetLayout};
use crate::title::SheetTitle;
use crate::value::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    UnknownSheet(String),
    /// The key is not produced by the sheet's resolved cells, or belongs to an abstract row.
    NotEnterable { sheet: String, key: String },
    Template(TemplateError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownSheet(code) => write!(f, "unknown sheet '{}'", code),
            SessionError::NotEnterable { sheet, key } => {
                write!(f, "'{}' is not an enterable cell of sheet {}", key, sheet)
            }
            SessionError::Template(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TemplateError> for SessionError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::UnknownSheet(code) => SessionError::UnknownSheet(code),
            other => SessionError::Template(other),
        }
    }
}

/// Everything a renderer needs for one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetView {
    pub code: String,
    pub shape: SheetShape,
    pub title: SheetTitle,
    pub headers: Vec<DisplayValue>,
    pub cells: Vec<ViewCell>,
    /// Set when the shape can't be rendered; carries the raw configuration.
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewCell {
    #[serde(flatten)]
    pub cell: ResolvedCell,
    pub storage_key: String,
    pub value: Option<Scalar>,
}

pub struct Session<'a> {
    templates: &'a TemplateSet,
    resolver: Resolver<'a>,
    bilancio: Bilancio,
    revision: u64,
}

impl<'a> Session<'a> {
    pub fn new(templates: &'a TemplateSet, resolver: Resolver<'a>, bilancio: Bilancio) -> Self {
        Self {
            templates,
            resolver,
            bilancio,
            revision: 0,
        }
    }

    pub fn bilancio(&self) -> &Bilancio {
        &self.bilancio
    }

    pub fn into_bilancio(self) -> Bilancio {
        self.bilancio
    }

    /// Incremented on every stored edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn display_context(&self) -> DisplayContext {
        DisplayContext::from_metadata(&self.bilancio.metadata)
    }

    fn layout(&self, sheet_code: &str) -> Result<SheetLayout<'a>, SessionError> {
        Ok(SheetLayout::load(self.templates, sheet_code)?)
    }

    pub fn resolved_cells(&self, sheet_code: &str) -> Result<Vec<ResolvedCell>, SessionError> {
        let layout = self.layout(sheet_code)?;
        Ok(self.resolver.resolve_layout(&layout))
    }

    pub fn value(&self, sheet_code: &str, storage_key: &str) -> Option<&Scalar> {
        self.bilancio.value(sheet_code, storage_key)
    }

    /// Validate and store an edit.
    ///
    /// Invalid values are reported in the outcome and not stored. Blank
    /// values are stored as null.
    pub fn set_value(
        &mut self,
        sheet_code: &str,
        storage_key: &str,
        value: Scalar,
    ) -> Result<ValidationOutcome, SessionError> {
        let cells = self.resolved_cells(sheet_code)?;
        let cell = cells
            .iter()
            .find(|c| c.storage_key() == storage_key && c.is_enterable())
            .ok_or_else(|| SessionError::NotEnterable {
                sheet: sheet_code.to_string(),
                key: storage_key.to_string(),
            })?;

        let outcome = validate_value(storage_key, &value, cell.value_type);
        if !outcome.valid {
            log::debug!("{sheet_code}: rejected edit of {storage_key}");
            return Ok(outcome);
        }

        let value = if value.is_blank() { Scalar::Null } else { value };
        self.bilancio.set(sheet_code, storage_key, value);
        self.revision += 1;
        Ok(outcome)
    }

    pub fn title(&self, sheet_code: &str) -> Result<SheetTitle, SessionError> {
        let layout = self.layout(sheet_code)?;
        Ok(self.resolver.title(&layout))
    }

    pub fn column_headers(&self, sheet_code: &str) -> Result<Vec<DisplayValue>, SessionError> {
        let layout = self.layout(sheet_code)?;
        Ok(column_headers(layout.grid, &layout.config, &self.display_context()))
    }

    pub fn view(&self, sheet_code: &str) -> Result<SheetView, SessionError> {
        let layout = self.layout(sheet_code)?;
        let shape = layout.config.tipo_tab;
        let diagnostic = match shape {
            SheetShape::Special | SheetShape::Unknown(_) => Some(format!(
                "tipo_tab {} ({}) is not supported; configuration: {:?}",
                shape.code(),
                shape.name(),
                layout.config.raw
            )),
            _ => None,
        };
        let cells = self
            .resolver
            .resolve_layout(&layout)
            .into_iter()
            .map(|cell| {
                let storage_key = cell.storage_key();
                let value = self.value(sheet_code, &storage_key).filter(|v| !v.is_null()).cloned();
                ViewCell { cell, storage_key, value }
            })
            .collect();

        Ok(SheetView {
            code: sheet_code.to_string(),
            shape,
            title: self.resolver.title(&layout),
            headers: column_headers(layout.grid, &layout.config, &self.display_context()),
            cells,
            diagnostic,
        })
    }

    /// Completion across every template sheet that resolves.
    pub fn stats(&self) -> BilancioStats {
        let resolved: Vec<(&str, Vec<ResolvedCell>)> = self
            .templates
            .sheet_codes()
            .iter()
            .filter_map(|code| match self.resolved_cells(code) {
                Ok(cells) => Some((code.as_str(), cells)),
                Err(e) => {
                    log::warn!("{code}: skipped in stats: {e}");
                    None
                }
            })
            .collect();
        self.bilancio
            .stats(resolved.iter().map(|(code, cells)| (*code, cells.as_slice())))
    }
}
