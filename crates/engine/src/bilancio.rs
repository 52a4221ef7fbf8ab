//! The financial statement instance: metadata plus per-sheet key/value data.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedCell;
use crate::value::Scalar;

pub const BILANCIO_VERSION: &str = "1.0";

/// Flat storage of one sheet: storage key -> value.
pub type SheetData = BTreeMap<String, Scalar>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilancioMetadata {
    pub versione: String,
    pub data_creazione: DateTime<Utc>,
    pub data_modifica: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ragione_sociale: Option<String>,
    #[serde(default)]
    pub anno_esercizio: Option<i32>,
    #[serde(default)]
    pub anno_precedente: Option<i32>,
    #[serde(default)]
    pub inizio_esercizio: Option<NaiveDate>,
    #[serde(default)]
    pub fine_esercizio: Option<NaiveDate>,
    #[serde(default)]
    pub inizio_precedente: Option<NaiveDate>,
    #[serde(default)]
    pub fine_precedente: Option<NaiveDate>,
    #[serde(default)]
    pub codice_fiscale: Option<String>,
    #[serde(default)]
    pub valuta: Option<String>,
}

impl BilancioMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            versione: BILANCIO_VERSION.to_string(),
            data_creazione: now,
            data_modifica: now,
            ragione_sociale: None,
            anno_esercizio: Some(now.year()),
            anno_precedente: None,
            inizio_esercizio: None,
            fine_esercizio: None,
            inizio_precedente: None,
            fine_precedente: None,
            codice_fiscale: None,
            valuta: Some("EUR".to_string()),
        }
    }
}

/// Completion figures over the resolved enterable cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BilancioStats {
    pub total_cells: usize,
    pub filled_cells: usize,
    pub completion_percent: u32,
    pub last_modified: DateTime<Utc>,
}

/// Persisted as `{metadata, fogli: {sheet: {key: value}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bilancio {
    pub metadata: BilancioMetadata,
    #[serde(default)]
    pub fogli: BTreeMap<String, SheetData>,
}

impl Bilancio {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            metadata: BilancioMetadata::new(now),
            fogli: BTreeMap::new(),
        }
    }

    /// Pre-seed an empty data map for each sheet.
    pub fn with_sheets<I, S>(mut self, sheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for sheet in sheets {
            self.fogli.entry(sheet.into()).or_default();
        }
        self
    }

    pub fn sheet(&self, sheet_code: &str) -> Option<&SheetData> {
        self.fogli.get(sheet_code)
    }

    pub fn value(&self, sheet_code: &str, storage_key: &str) -> Option<&Scalar> {
        self.fogli.get(sheet_code)?.get(storage_key)
    }

    /// Store a value without any checks; returns the previous one.
    pub fn set(&mut self, sheet_code: &str, storage_key: &str, value: Scalar) -> Option<Scalar> {
        self.fogli
            .entry(sheet_code.to_string())
            .or_default()
            .insert(storage_key.to_string(), value)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.data_modifica = now;
    }

    /// Completion over `cells` (sheet code -> resolved cells); abstract cells don't count.
    pub fn stats<'c, I>(&self, cells: I) -> BilancioStats
    where
        I: IntoIterator<Item = (&'c str, &'c [ResolvedCell])>,
    {
        let mut total = 0;
        let mut filled = 0;
        for (sheet, sheet_cells) in cells {
            for cell in sheet_cells.iter().filter(|c| c.is_enterable()) {
                total += 1;
                if self.value(sheet, &cell.storage_key()).is_some_and(|v| !v.is_blank()) {
                    filled += 1;
                }
            }
        }
        let completion_percent = if total == 0 {
            0
        } else {
            ((filled as f64 / total as f64) * 100.0).round() as u32
        };
        BilancioStats {
            total_cells: total,
            filled_cells: filled,
            completion_percent,
            last_modified: self.metadata.data_modifica,
        }
    }

    /// Stored keys of a sheet that its current resolved cells can't produce.
    pub fn stale_keys(&self, sheet_code: &str, cells: &[ResolvedCell]) -> Vec<String> {
        let Some(data) = self.fogli.get(sheet_code) else {
            return Vec::new();
        };
        let known: BTreeSet<String> = cells.iter().map(ResolvedCell::storage_key).collect();
        data.keys().filter(|k| !known.contains(*k)).cloned().collect()
    }
}
