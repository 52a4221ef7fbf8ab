//! Bidirectional cell codec.
//!
//! A [`ResolvedCell`] maps to a storage key (the data store), a grid
//! coordinate (spreadsheet import/export) and, for header cells, a display
//! value with `=`-placeholder substitution. Import and export both go
//! through [`grid_coordinate`], so a value written at a coordinate is read
//! back from the same coordinate.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::bilancio::BilancioMetadata;
use crate::config::ConfigRecord;
use crate::grid::DenseGrid;
use crate::labels::{LabelMapping, ValueType};
use crate::resolver::ResolvedCell;
use crate::value::{format_number, Scalar};

// ============================================================================
// Coordinates and keys
// ============================================================================

/// 0-based native spreadsheet coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GridCoordinate {
    pub row: usize,
    pub col: usize,
}

impl GridCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// A1 notation (`(9, 3)` -> `D10`).
    pub fn a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// Spreadsheet column name for a 0-based index (0 -> A, 26 -> AA).
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// The single address formula shared by render, import and export.
pub fn grid_coordinate(config: &ConfigRecord, row_offset: usize, col_index: usize) -> GridCoordinate {
    GridCoordinate {
        row: config.first_row.saturating_add(row_offset),
        col: config.first_col.saturating_add(col_index),
    }
}

pub fn to_storage_key(cell: &ResolvedCell) -> String {
    cell.storage_key()
}

pub fn to_grid_coordinate(cell: &ResolvedCell) -> GridCoordinate {
    cell.coordinate()
}

// ============================================================================
// Display values
// ============================================================================

/// Values the placeholder names resolve to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayContext {
    pub anno_esercizio: Option<i32>,
    pub anno_precedente: Option<i32>,
    pub codice_fiscale: Option<String>,
    pub valuta: Option<String>,
}

impl DisplayContext {
    pub fn from_metadata(metadata: &BilancioMetadata) -> Self {
        Self {
            anno_esercizio: metadata.anno_esercizio,
            anno_precedente: metadata.anno_precedente,
            codice_fiscale: metadata.codice_fiscale.clone(),
            valuta: metadata.valuta.clone(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.anno_esercizio = Some(year);
        self
    }

    /// Previous fiscal year: explicit, else the current year minus one.
    pub fn previous_year(&self) -> Option<i32> {
        self.anno_precedente.or(self.anno_esercizio.map(|y| y - 1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Blank,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Blank => Ok(()),
            DisplayValue::Integer(n) => write!(f, "{n}"),
            DisplayValue::Number(n) => f.write_str(&format_number(*n)),
            DisplayValue::Text(s) => f.write_str(s),
        }
    }
}

fn year_pattern() -> Option<&'static Regex> {
    static YEAR: OnceLock<Option<Regex>> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\d{4}").ok()).as_ref()
}

/// First 4-digit run in `text`, as a year.
pub fn embedded_year(text: &str) -> Option<i32> {
    year_pattern()?.find(text)?.as_str().parse().ok()
}

/// Render a raw template value.
///
/// Strings starting with `=` are placeholders, not formulas: an embedded
/// 4-digit year wins, then the names `c_this`/`anno_corrente`,
/// `c_prev`/`anno_precedente`, `cf` and `unit`; anything else shows the
/// text after the `=`.
pub fn to_display_value(raw: &Scalar, ctx: &DisplayContext) -> DisplayValue {
    match raw {
        Scalar::Null => DisplayValue::Blank,
        Scalar::Bool(_) => DisplayValue::Text(raw.to_string()),
        Scalar::Number(n) => DisplayValue::Number(*n),
        Scalar::Text(s) => match s.strip_prefix('=') {
            Some(placeholder) => resolve_placeholder(placeholder, ctx),
            None => DisplayValue::Text(s.clone()),
        },
    }
}

fn resolve_placeholder(placeholder: &str, ctx: &DisplayContext) -> DisplayValue {
    if let Some(year) = embedded_year(placeholder) {
        return DisplayValue::Integer(i64::from(year));
    }
    let name = placeholder.trim().to_ascii_lowercase();
    let resolved = match name.as_str() {
        "c_this" | "anno_corrente" => ctx.anno_esercizio.map(|y| DisplayValue::Integer(i64::from(y))),
        "c_prev" | "anno_precedente" => ctx.previous_year().map(|y| DisplayValue::Integer(i64::from(y))),
        "cf" => ctx.codice_fiscale.clone().map(DisplayValue::Text),
        "unit" => ctx.valuta.clone().map(DisplayValue::Text),
        _ => None,
    };
    resolved.unwrap_or_else(|| DisplayValue::Text(placeholder.to_string()))
}

/// Column header texts: the row above the data region, one per data column.
pub fn column_headers(grid: &DenseGrid, config: &ConfigRecord, ctx: &DisplayContext) -> Vec<DisplayValue> {
    if config.first_row == 0 {
        return Vec::new();
    }
    let row = config.first_row - 1;
    let cols = config.nr_col.min(grid.width().saturating_sub(config.first_col));
    (0..cols)
        .map(|c| to_display_value(grid.get(row, config.first_col + c), ctx))
        .collect()
}

// ============================================================================
// Validation
// ============================================================================

/// Result of checking one value against its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self { valid: true, message: None }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validate a value for the cell owning `storage_key`, looked up in the mapping.
pub fn validate(storage_key: &str, value: &Scalar, sheet_code: &str, labels: &LabelMapping) -> ValidationOutcome {
    let value_type = labels
        .lookup(sheet_code, storage_key)
        .map_or(ValueType::String, |e| e.value_type);
    validate_value(storage_key, value, value_type)
}

/// Numeric types reject non-empty values that don't parse as a whole; everything
/// else passes. `"12abc"` is rejected rather than read as 12.
pub fn validate_value(storage_key: &str, value: &Scalar, value_type: ValueType) -> ValidationOutcome {
    if !value_type.is_numeric() || value.is_blank() {
        return ValidationOutcome::ok();
    }
    match value {
        Scalar::Number(n) if n.is_finite() => ValidationOutcome::ok(),
        Scalar::Text(_) if value.as_number().is_some_and(f64::is_finite) => ValidationOutcome::ok(),
        _ => ValidationOutcome::invalid(format!(
            "{storage_key}: '{value}' is not a valid {} value",
            type_name(value_type)
        )),
    }
}

fn type_name(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Monetary => "monetary",
        ValueType::Decimal => "decimal",
        ValueType::String => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelEntry;

    fn ctx() -> DisplayContext {
        DisplayContext {
            anno_esercizio: Some(2024),
            anno_precedente: None,
            codice_fiscale: Some("01234567890".into()),
            valuta: Some("EUR".into()),
        }
    }

    #[test]
    fn a1_notation() {
        assert_eq!(GridCoordinate::new(9, 3).a1(), "D10");
        assert_eq!(GridCoordinate::new(0, 25).a1(), "Z1");
        assert_eq!(GridCoordinate::new(0, 26).a1(), "AA1");
        assert_eq!(GridCoordinate::new(4, 701).a1(), "ZZ5");
    }

    #[test]
    fn placeholders() {
        let t = |s: &str| to_display_value(&Scalar::Text(s.into()), &ctx());
        assert_eq!(t("=c2022"), DisplayValue::Integer(2022));
        assert_eq!(t("=c_this"), DisplayValue::Integer(2024));
        assert_eq!(t("=anno_corrente"), DisplayValue::Integer(2024));
        assert_eq!(t("=c_prev"), DisplayValue::Integer(2023));
        assert_eq!(t("=cf"), DisplayValue::Text("01234567890".into()));
        assert_eq!(t("=unit"), DisplayValue::Text("EUR".into()));
        assert_eq!(t("=foo"), DisplayValue::Text("foo".into()));
        assert_eq!(t("Totale"), DisplayValue::Text("Totale".into()));
    }

    #[test]
    fn unresolved_names_fall_back_to_literal() {
        let empty = DisplayContext::default();
        assert_eq!(
            to_display_value(&Scalar::Text("=c_this".into()), &empty),
            DisplayValue::Text("c_this".into())
        );
        assert_eq!(to_display_value(&Scalar::Null, &empty), DisplayValue::Blank);
        assert_eq!(to_display_value(&Scalar::Number(2.5), &empty).to_string(), "2.5");
    }

    #[test]
    fn explicit_previous_year_wins() {
        let ctx = DisplayContext {
            anno_precedente: Some(2020),
            ..ctx()
        };
        assert_eq!(
            to_display_value(&Scalar::Text("=anno_precedente".into()), &ctx),
            DisplayValue::Integer(2020)
        );
    }

    #[test]
    fn headers_come_from_preceding_row() {
        let mut grid = DenseGrid::empty(5, 6);
        grid.set(3, 3, Scalar::Text("=c_this".into()));
        grid.set(3, 4, Scalar::Text("=c_prev".into()));
        let config = ConfigRecord {
            first_row: 4,
            first_col: 3,
            nr_col: 2,
            ..Default::default()
        };
        let headers = column_headers(&grid, &config, &ctx());
        assert_eq!(headers, vec![DisplayValue::Integer(2024), DisplayValue::Integer(2023)]);
    }

    #[test]
    fn numeric_types_reject_garbage() {
        let mut labels = LabelMapping::new();
        labels.insert("T0002", LabelEntry::new("A01", "Crediti").with_type(ValueType::Monetary));
        labels.insert("T0002", LabelEntry::new("N", "Note"));

        let bad = validate("A01_c_this", &Scalar::Text("abc".into()), "T0002", &labels);
        assert!(!bad.valid);
        assert!(bad.message.unwrap().contains("monetary"));

        assert!(validate("A01_c_this", &Scalar::Text(" 1200.50 ".into()), "T0002", &labels).valid);
        assert!(validate("A01_c_this", &Scalar::Text("".into()), "T0002", &labels).valid);
        assert!(validate("A01_c_this", &Scalar::Number(7.0), "T0002", &labels).valid);
        assert!(!validate("A01_c_this", &Scalar::Bool(true), "T0002", &labels).valid);
        assert!(validate("N", &Scalar::Text("abc".into()), "T0002", &labels).valid);
        assert!(validate("UNKNOWN", &Scalar::Text("abc".into()), "T0002", &labels).valid);
    }

    #[test]
    fn numeric_text_must_parse_whole() {
        let outcome = validate_value("A01_c_this", &Scalar::Text("12abc".into()), ValueType::Decimal);
        assert!(!outcome.valid);
        assert_eq!(
            outcome.message.as_deref(),
            Some("A01_c_this: '12abc' is not a valid decimal value")
        );
        assert!(!validate_value("A01_c_this", &Scalar::Text("inf".into()), ValueType::Monetary).valid);
        assert!(validate_value("A01_c_this", &Scalar::Text("-3e2".into()), ValueType::Monetary).valid);
    }

    #[test]
    fn headers_stop_at_grid_edge() {
        let mut grid = DenseGrid::empty(5, 4);
        grid.set(3, 3, Scalar::Text("=c_this".into()));
        let config = ConfigRecord {
            first_row: 4,
            first_col: 3,
            nr_col: usize::MAX,
            ..Default::default()
        };
        assert_eq!(column_headers(&grid, &config, &ctx()), vec![DisplayValue::Integer(2024)]);
    }
}
