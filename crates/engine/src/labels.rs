//! Label mapping: per-sheet display metadata looked up by row code.
//!
//! The mapping is produced outside this crate (from the reporting taxonomy)
//! and is read-only here. Lookups try the exact code first, then the part
//! before the first `_`, so composite storage keys such as `A01_c_this`
//! find the entry for `A01`.

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Declared value type of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Monetary,
    Decimal,
    #[default]
    String,
}

impl ValueType {
    /// Classify a taxonomy type name (`monetary`, `xbrli:decimalItemType`, `nonnum:textBlock`, ...).
    pub fn from_declared(declared: &str) -> Self {
        let lower = declared.to_ascii_lowercase();
        if lower.contains("monetary") {
            ValueType::Monetary
        } else if ["decimal", "shares", "pure", "percent"].iter().any(|t| lower.contains(t)) {
            ValueType::Decimal
        } else {
            ValueType::String
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Monetary | ValueType::Decimal)
    }
}

/// Display metadata for one code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelEntry {
    pub code: String,
    pub label: String,
    pub indent_level: usize,
    pub is_abstract: bool,
    pub value_type: ValueType,
}

impl LabelEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            indent_level: 0,
            is_abstract: false,
            value_type: ValueType::String,
        }
    }

    pub fn with_indent(mut self, level: usize) -> Self {
        self.indent_level = level;
        self
    }

    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }
}

#[derive(Debug, Default)]
struct SheetLabels {
    entries: Vec<LabelEntry>,
    by_code: FxHashMap<String, usize>,
}

/// Label mapping for all sheets.
#[derive(Debug, Default)]
pub struct LabelMapping {
    sheets: FxHashMap<String, SheetLabels>,
}

impl LabelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. The first entry for a code wins on lookup.
    pub fn insert(&mut self, sheet_code: &str, entry: LabelEntry) {
        let sheet = self.sheets.entry(sheet_code.to_string()).or_default();
        let idx = sheet.entries.len();
        sheet.by_code.entry(entry.code.clone()).or_insert(idx);
        sheet.entries.push(entry);
    }

    /// Exact match on `code`, then on the prefix before the first `_`.
    pub fn lookup(&self, sheet_code: &str, code: &str) -> Option<&LabelEntry> {
        let sheet = self.sheets.get(sheet_code)?;
        let idx = sheet.by_code.get(code).or_else(|| {
            let base = code.split('_').next().unwrap_or(code);
            sheet.by_code.get(base)
        })?;
        sheet.entries.get(*idx)
    }

    pub fn entries(&self, sheet_code: &str) -> &[LabelEntry] {
        self.sheets.get(sheet_code).map_or(&[], |s| s.entries.as_slice())
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Parse a mappings document.
    ///
    /// Accepts the generated layout
    /// `{metadata, mappature: {sheet: [{code, ui: {label, indent_level, is_abstract}, xbrl: {type, ..}}]}}`,
    /// the legacy `codice_excel` key, and flat entries
    /// `{code, label, indentLevel, isAbstract, type}`.
    pub fn from_json(input: &str) -> Result<Self, TemplateError> {
        let doc: RawDocument =
            serde_json::from_str(input).map_err(|e| TemplateError::MalformedMapping(e.to_string()))?;
        let mut mapping = LabelMapping::new();
        // Sheet codes are sorted so insertion order doesn't depend on hashing.
        let mut sheets: Vec<_> = doc.mappature.into_iter().collect();
        sheets.sort_by(|a, b| a.0.cmp(&b.0));
        for (sheet, entries) in sheets {
            for raw in entries {
                mapping.insert(&sheet, raw.into_entry());
            }
        }
        Ok(mapping)
    }
}

// ----------------------------------------------------------------------------
// Raw document shapes
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawDocument {
    #[serde(alias = "mappings", default)]
    mappature: HashMap<String, Vec<RawEntry>>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(alias = "codice_excel")]
    code: String,
    #[serde(default)]
    ui: Option<RawUi>,
    #[serde(default)]
    xbrl: Option<RawXbrl>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, alias = "indentLevel")]
    indent_level: Option<usize>,
    #[serde(default, alias = "isAbstract")]
    is_abstract: Option<bool>,
    #[serde(default, rename = "type")]
    declared_type: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawUi {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    indent_level: Option<usize>,
    #[serde(default)]
    is_abstract: Option<bool>,
}

#[derive(Deserialize, Default)]
struct RawXbrl {
    #[serde(default, rename = "type")]
    declared_type: Option<String>,
}

impl RawEntry {
    fn into_entry(self) -> LabelEntry {
        let ui = self.ui.unwrap_or_default();
        let declared = self
            .xbrl
            .and_then(|x| x.declared_type)
            .or(self.declared_type);
        let declared_abstract = declared.as_deref() == Some("abstract");

        LabelEntry {
            code: self.code,
            label: ui.label.or(self.label).unwrap_or_default(),
            indent_level: ui.indent_level.or(self.indent_level).unwrap_or(0),
            is_abstract: ui.is_abstract.or(self.is_abstract).unwrap_or(false) || declared_abstract,
            value_type: declared.as_deref().map(ValueType::from_declared).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED: &str = r#"{
        "metadata": {"version": "2.0"},
        "mappature": {
            "T0002": [
                {"code": "A01", "ui": {"label": "Crediti", "indent_level": 1, "is_abstract": false},
                 "xbrl": {"name": "Crediti", "prefix": "itcc-ci", "type": "monetary"}},
                {"code": "A00", "ui": {"label": "Attivo", "indent_level": 0, "is_abstract": true}},
                {"codice_excel": "A02", "ui": {"label": "Ratei"}, "xbrl": {"name": "x", "type": "xbrli:decimalItemType"}}
            ],
            "T0167": [
                {"code": "T0167.TXT", "ui": {"label": "Commento"}, "xbrl": {"name": "c", "type": "nonnum:textBlock"}}
            ]
        }
    }"#;

    #[test]
    fn parses_generated_document() {
        let mapping = LabelMapping::from_json(GENERATED).unwrap();
        assert_eq!(mapping.sheet_count(), 2);

        let a01 = mapping.lookup("T0002", "A01").unwrap();
        assert_eq!(a01.label, "Crediti");
        assert_eq!(a01.indent_level, 1);
        assert_eq!(a01.value_type, ValueType::Monetary);

        assert!(mapping.lookup("T0002", "A00").unwrap().is_abstract);
        assert_eq!(mapping.lookup("T0002", "A02").unwrap().value_type, ValueType::Decimal);
        assert_eq!(mapping.lookup("T0167", "T0167.TXT").unwrap().value_type, ValueType::String);
    }

    #[test]
    fn flat_entries() {
        let doc = r#"{"mappature": {"T0006": [
            {"code": "R1", "label": "Ricavi", "indentLevel": 2, "isAbstract": false, "type": "monetary"},
            {"code": "H", "label": "Header", "type": "abstract"}
        ]}}"#;
        let mapping = LabelMapping::from_json(doc).unwrap();
        let r1 = mapping.lookup("T0006", "R1").unwrap();
        assert_eq!((r1.indent_level, r1.value_type), (2, ValueType::Monetary));
        assert!(mapping.lookup("T0006", "H").unwrap().is_abstract);
    }

    #[test]
    fn prefix_fallback_for_composite_keys() {
        let mut mapping = LabelMapping::new();
        mapping.insert("T0002", LabelEntry::new("A01", "Crediti").with_type(ValueType::Monetary));
        assert_eq!(mapping.lookup("T0002", "A01_c_this").unwrap().code, "A01");
        assert!(mapping.lookup("T0002", "B01_c_this").is_none());
        assert!(mapping.lookup("T0099", "A01").is_none());
    }

    #[test]
    fn malformed_document() {
        assert!(matches!(
            LabelMapping::from_json("{\"mappature\": 3}"),
            Err(TemplateError::MalformedMapping(_))
        ));
    }

    #[test]
    fn declared_type_classification() {
        assert_eq!(ValueType::from_declared("monetary"), ValueType::Monetary);
        assert_eq!(ValueType::from_declared("xbrli:monetaryItemType"), ValueType::Monetary);
        assert_eq!(ValueType::from_declared("decimal"), ValueType::Decimal);
        assert_eq!(ValueType::from_declared("xbrli:sharesItemType"), ValueType::Decimal);
        assert_eq!(ValueType::from_declared("nonnum:textBlock"), ValueType::String);
    }
}
