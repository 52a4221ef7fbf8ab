//! Workbook-level named values: fiscal period dates, legal identifier, currency.
//!
//! Each named range has an input location on the `index` sheet and,
//! optionally, a computed location on the `config` sheet. The input wins when
//! it holds a value. Only spreadsheet import consults this module; rendering
//! and export read the Bilancio metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::bilancio::BilancioMetadata;
use crate::codec::embedded_year;
use crate::value::Scalar;
use crate::workbook::WorkbookGrid;

pub const INDEX_SHEET: &str = "index";
pub const CONFIG_SHEET: &str = "config";

const MS_PER_DAY: f64 = 86_400_000.0;
/// Serial of 9999-12-31.
const MAX_SERIAL: f64 = 2_958_465.0;

/// The closed set of named ranges the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedRange {
    EntityName,
    LegalIdentifier,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    PreviousPeriodStart,
    PreviousPeriodEnd,
    CurrencyUnit,
    CurrentContextLabel,
    PreviousContextLabel,
}

impl NamedRange {
    pub const ALL: [NamedRange; 9] = [
        NamedRange::EntityName,
        NamedRange::LegalIdentifier,
        NamedRange::CurrentPeriodStart,
        NamedRange::CurrentPeriodEnd,
        NamedRange::PreviousPeriodStart,
        NamedRange::PreviousPeriodEnd,
        NamedRange::CurrencyUnit,
        NamedRange::CurrentContextLabel,
        NamedRange::PreviousContextLabel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NamedRange::EntityName => "entity_name",
            NamedRange::LegalIdentifier => "legal_identifier",
            NamedRange::CurrentPeriodStart => "current_period_start",
            NamedRange::CurrentPeriodEnd => "current_period_end",
            NamedRange::PreviousPeriodStart => "previous_period_start",
            NamedRange::PreviousPeriodEnd => "previous_period_end",
            NamedRange::CurrencyUnit => "currency_unit",
            NamedRange::CurrentContextLabel => "current_context_label",
            NamedRange::PreviousContextLabel => "previous_context_label",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self,
            NamedRange::CurrentPeriodStart
                | NamedRange::CurrentPeriodEnd
                | NamedRange::PreviousPeriodStart
                | NamedRange::PreviousPeriodEnd
        )
    }
}

impl fmt::Display for NamedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamedRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamedRange::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown named range '{s}'"))
    }
}

/// A single cell on a named sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLocation {
    pub sheet: String,
    pub row: usize,
    pub col: usize,
}

impl CellLocation {
    pub fn new(sheet: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeLocation {
    /// Where the user types the value.
    pub input: CellLocation,
    /// Where the workbook computes it, if anywhere.
    #[serde(default)]
    pub computed: Option<CellLocation>,
}

/// Named range -> location table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLocations {
    pub ranges: BTreeMap<NamedRange, RangeLocation>,
}

impl Default for ContextLocations {
    fn default() -> Self {
        // (range, index row, config row); inputs are in column C of the index,
        // computed values in column B of the config sheet.
        let layout = [
            (NamedRange::EntityName, 1, 0),
            (NamedRange::LegalIdentifier, 2, 1),
            (NamedRange::CurrentPeriodStart, 4, 3),
            (NamedRange::CurrentPeriodEnd, 5, 4),
            (NamedRange::PreviousPeriodStart, 6, 5),
            (NamedRange::PreviousPeriodEnd, 7, 6),
            (NamedRange::CurrencyUnit, 8, 7),
            (NamedRange::CurrentContextLabel, 10, 9),
            (NamedRange::PreviousContextLabel, 11, 10),
        ];
        let ranges = layout
            .into_iter()
            .map(|(range, index_row, config_row)| {
                (
                    range,
                    RangeLocation {
                        input: CellLocation::new(INDEX_SHEET, index_row, 2),
                        computed: Some(CellLocation::new(CONFIG_SHEET, config_row, 1)),
                    },
                )
            })
            .collect();
        Self { ranges }
    }
}

impl ContextLocations {
    pub fn get(&self, range: NamedRange) -> Option<&RangeLocation> {
        self.ranges.get(&range)
    }

    /// Sheets that hold context values and are not data sheets.
    pub fn reserved_sheets(&self) -> Vec<&str> {
        let mut sheets: Vec<&str> = self
            .ranges
            .values()
            .flat_map(|loc| std::iter::once(&loc.input).chain(loc.computed.as_ref()))
            .map(|c| c.sheet.as_str())
            .collect();
        sheets.sort_unstable();
        sheets.dedup();
        sheets
    }
}

/// Value of a named range: the input location if it holds a value, else the computed one.
pub fn resolve_named_range(workbook: &WorkbookGrid, range: NamedRange, locations: &ContextLocations) -> Option<Scalar> {
    let location = locations.get(range)?;
    let read = |at: &CellLocation| {
        workbook
            .cell(&at.sheet, at.row, at.col)
            .filter(|v| !v.is_blank())
            .cloned()
    };
    read(&location.input).or_else(|| location.computed.as_ref().and_then(read))
}

// ============================================================================
// Dates
// ============================================================================

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Spreadsheet serial to calendar date (epoch 1899-12-30, time of day dropped).
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let ms = (serial * MS_PER_DAY).round();
    let days = (ms / MS_PER_DAY).floor() as i64;
    epoch()?.checked_add_signed(Duration::days(days))
}

pub fn date_to_serial(date: NaiveDate) -> f64 {
    match epoch() {
        Some(epoch) => (date - epoch).num_days() as f64,
        None => 0.0,
    }
}

/// A date from a cell: a serial number, ISO text (`2024-12-31`, optionally
/// with a time part), `dd/mm/yyyy` text, or a serial in text form.
pub fn scalar_to_date(value: &Scalar) -> Option<NaiveDate> {
    match value {
        Scalar::Number(n) => serial_to_date(*n),
        Scalar::Text(s) => {
            let s = s.trim();
            let iso = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(iso, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(serial_to_date))
        }
        _ => None,
    }
}

/// A plausible fiscal year embedded in a context label (`"Esercizio 2024"`).
pub fn extract_year(label: &str) -> Option<i32> {
    embedded_year(label).filter(|y| (1900..=2200).contains(y))
}

// ============================================================================
// Resolved context
// ============================================================================

/// Metadata recovered from a workbook's named ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedContext {
    pub ragione_sociale: Option<String>,
    pub codice_fiscale: Option<String>,
    pub valuta: Option<String>,
    pub inizio_esercizio: Option<NaiveDate>,
    pub fine_esercizio: Option<NaiveDate>,
    pub inizio_precedente: Option<NaiveDate>,
    pub fine_precedente: Option<NaiveDate>,
    pub anno_esercizio: Option<i32>,
    pub anno_precedente: Option<i32>,
}

impl ResolvedContext {
    pub fn is_empty(&self) -> bool {
        *self == ResolvedContext::default()
    }

    /// Copy every resolved field into the metadata; unresolved fields are left alone.
    pub fn apply_to(&self, metadata: &mut BilancioMetadata) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        set(&mut metadata.ragione_sociale, &self.ragione_sociale);
        set(&mut metadata.codice_fiscale, &self.codice_fiscale);
        set(&mut metadata.valuta, &self.valuta);
        set(&mut metadata.inizio_esercizio, &self.inizio_esercizio);
        set(&mut metadata.fine_esercizio, &self.fine_esercizio);
        set(&mut metadata.inizio_precedente, &self.inizio_precedente);
        set(&mut metadata.fine_precedente, &self.fine_precedente);
        set(&mut metadata.anno_esercizio, &self.anno_esercizio);
        set(&mut metadata.anno_precedente, &self.anno_precedente);
    }
}

/// Resolve all named ranges of a workbook.
///
/// Fiscal years come from the context labels first, then from the period end
/// and start dates. A missing previous year is the current year minus one.
pub fn resolve_context(workbook: &WorkbookGrid, locations: &ContextLocations) -> ResolvedContext {
    let get = |range: NamedRange| resolve_named_range(workbook, range, locations);
    let text = |range: NamedRange| get(range).and_then(|v| v.as_code());
    let date = |range: NamedRange| {
        let value = get(range)?;
        let parsed = scalar_to_date(&value);
        if parsed.is_none() {
            log::warn!("{range}: '{value}' is not a date");
        }
        parsed
    };
    let label_year = |range: NamedRange| get(range).and_then(|v| extract_year(&v.to_string()));

    let inizio_esercizio = date(NamedRange::CurrentPeriodStart);
    let fine_esercizio = date(NamedRange::CurrentPeriodEnd);
    let inizio_precedente = date(NamedRange::PreviousPeriodStart);
    let fine_precedente = date(NamedRange::PreviousPeriodEnd);

    let anno_esercizio = label_year(NamedRange::CurrentContextLabel)
        .or(fine_esercizio.map(|d| d.year()))
        .or(inizio_esercizio.map(|d| d.year()));
    let anno_precedente = label_year(NamedRange::PreviousContextLabel)
        .or(fine_precedente.map(|d| d.year()))
        .or(inizio_precedente.map(|d| d.year()))
        .or(anno_esercizio.map(|y| y - 1));

    let context = ResolvedContext {
        ragione_sociale: text(NamedRange::EntityName),
        codice_fiscale: text(NamedRange::LegalIdentifier),
        valuta: text(NamedRange::CurrencyUnit),
        inizio_esercizio,
        fine_esercizio,
        inizio_precedente,
        fine_precedente,
        anno_esercizio,
        anno_precedente,
    };
    log::debug!("resolved workbook context: {context:?}");
    context
}

/// Metadata values as workbook cells, placed at their input locations (dates as serials).
pub fn context_cells(metadata: &BilancioMetadata, locations: &ContextLocations) -> Vec<(CellLocation, Scalar)> {
    let date = |d: Option<NaiveDate>| d.map(|d| Scalar::Number(date_to_serial(d)));
    let year_label = |y: Option<i32>| y.map(|y| Scalar::Text(format!("Esercizio {y}")));

    NamedRange::ALL
        .into_iter()
        .filter_map(|range| {
            let value = match range {
                NamedRange::EntityName => metadata.ragione_sociale.clone().map(Scalar::Text),
                NamedRange::LegalIdentifier => metadata.codice_fiscale.clone().map(Scalar::Text),
                NamedRange::CurrencyUnit => metadata.valuta.clone().map(Scalar::Text),
                NamedRange::CurrentPeriodStart => date(metadata.inizio_esercizio),
                NamedRange::CurrentPeriodEnd => date(metadata.fine_esercizio),
                NamedRange::PreviousPeriodStart => date(metadata.inizio_precedente),
                NamedRange::PreviousPeriodEnd => date(metadata.fine_precedente),
                NamedRange::CurrentContextLabel => year_label(metadata.anno_esercizio),
                NamedRange::PreviousContextLabel => year_label(metadata.anno_precedente),
            }?;
            let location = locations.get(range)?;
            Some((location.input.clone(), value))
        })
        .collect()
}
