//! Sheet configuration header.
//!
//! Every template sheet carries its addressing rules in its first two rows:
//! row 0 holds parameter names, row 1 the matching values. Parsing is
//! tolerant: numeric parameters that don't parse become 0 so that legacy
//! templates with stray placeholders still render.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::TemplateError;
use crate::grid::DenseGrid;
use crate::value::Scalar;

/// Default row holding column codes when `col_code_nrrow` is absent.
pub const DEFAULT_COL_CODE_ROW: usize = 2;
/// Default context code for the first column of a two-column temporal sheet.
pub const DEFAULT_C1_CODE: &str = "c_this";
/// Default context code for the second column of a two-column temporal sheet.
pub const DEFAULT_C2_CODE: &str = "c_prev";

/// Structural pattern of a sheet (`tipo_tab`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetShape {
    /// 1: list of rows, optionally with two temporal columns, or a single free-text field.
    Simple,
    /// 2: rows x columns.
    Matrix,
    /// 3: repeatable tuple; collapses to one value per row without columns.
    Tuple,
    /// 4: reserved, layout not specified.
    Special,
    /// Anything else found in the header.
    Unknown(i64),
}

impl SheetShape {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => SheetShape::Simple,
            2 => SheetShape::Matrix,
            3 => SheetShape::Tuple,
            4 => SheetShape::Special,
            other => SheetShape::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SheetShape::Simple => 1,
            SheetShape::Matrix => 2,
            SheetShape::Tuple => 3,
            SheetShape::Special => 4,
            SheetShape::Unknown(code) => *code,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, SheetShape::Simple | SheetShape::Matrix | SheetShape::Tuple)
    }

    /// Strict check for callers that cannot degrade.
    pub fn require_supported(self, sheet: &str) -> Result<Self, TemplateError> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(TemplateError::UnsupportedShape {
                sheet: sheet.to_string(),
                tipo_tab: self.code(),
            })
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SheetShape::Simple => "simple",
            SheetShape::Matrix => "matrix",
            SheetShape::Tuple => "tuple",
            SheetShape::Special => "special",
            SheetShape::Unknown(_) => "unknown",
        }
    }
}

/// Parsed configuration of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRecord {
    pub tipo_tab: SheetShape,
    pub first_row: usize,
    pub first_col: usize,
    pub nr_row: usize,
    pub nr_col: usize,
    /// Column holding each row's code.
    pub row_code_nrcol: usize,
    /// Row holding each column's code.
    pub col_code_nrrow: usize,
    /// Column holding each row's label; defaults to two columns right of the code.
    pub row_label_nrcol: Option<usize>,
    pub c1_code: Option<String>,
    pub c2_code: Option<String>,
    /// Every name/value pair as found in the header, for diagnostics.
    pub raw: BTreeMap<String, Scalar>,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            tipo_tab: SheetShape::Unknown(0),
            first_row: 0,
            first_col: 0,
            nr_row: 0,
            nr_col: 0,
            row_code_nrcol: 0,
            col_code_nrrow: DEFAULT_COL_CODE_ROW,
            row_label_nrcol: None,
            c1_code: None,
            c2_code: None,
            raw: BTreeMap::new(),
        }
    }
}

impl ConfigRecord {
    /// Column holding the row labels.
    pub fn label_col(&self) -> usize {
        self.row_label_nrcol.unwrap_or(self.row_code_nrcol.saturating_add(2))
    }

    /// Context codes for a two-column temporal sheet, `=` stripped, with defaults.
    pub fn temporal_codes(&self) -> [String; 2] {
        [
            context_code(self.c1_code.as_deref()).unwrap_or_else(|| DEFAULT_C1_CODE.to_string()),
            context_code(self.c2_code.as_deref()).unwrap_or_else(|| DEFAULT_C2_CODE.to_string()),
        ]
    }

    /// True for the free-text single field layout (`nr_row = nr_col = 1` under the simple shape).
    pub fn is_single_field(&self) -> bool {
        self.tipo_tab == SheetShape::Simple && self.nr_row == 1 && self.nr_col == 1
    }
}

fn context_code(raw: Option<&str>) -> Option<String> {
    let code = raw?.trim();
    let code = code.strip_prefix('=').unwrap_or(code).trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// Read the two configuration header rows of a grid.
pub fn parse_config(sheet_code: &str, grid: &DenseGrid) -> Result<ConfigRecord, TemplateError> {
    if grid.height() < 2 {
        return Err(TemplateError::InvalidConfig {
            sheet: sheet_code.to_string(),
            reason: format!("expected 2 header rows, found {}", grid.height()),
        });
    }
    let names = grid.row(0).ok_or_else(|| TemplateError::InvalidConfig {
        sheet: sheet_code.to_string(),
        reason: "parameter name row is not a sequence".to_string(),
    })?;
    let values = grid.row(1).ok_or_else(|| TemplateError::InvalidConfig {
        sheet: sheet_code.to_string(),
        reason: "parameter value row is not a sequence".to_string(),
    })?;

    let mut config = ConfigRecord::default();
    for (idx, name) in names.iter().enumerate() {
        let Some(name) = name.as_code() else { continue };
        let name = name.to_ascii_lowercase();
        let value = values.get(idx).cloned().unwrap_or_default();

        match name.as_str() {
            "tipo_tab" => config.tipo_tab = SheetShape::from_code(soft_int(sheet_code, &name, &value)),
            "first_row" => config.first_row = soft_usize(sheet_code, &name, &value),
            "first_col" => config.first_col = soft_usize(sheet_code, &name, &value),
            "nr_row" => config.nr_row = soft_usize(sheet_code, &name, &value),
            "nr_col" => config.nr_col = soft_usize(sheet_code, &name, &value),
            "row_code_nrcol" => config.row_code_nrcol = soft_usize(sheet_code, &name, &value),
            "col_code_nrrow" => config.col_code_nrrow = soft_usize(sheet_code, &name, &value),
            "row_label_nrcol" => config.row_label_nrcol = Some(soft_usize(sheet_code, &name, &value)),
            "c1_code" => config.c1_code = value.as_code(),
            "c2_code" => config.c2_code = value.as_code(),
            _ => {}
        }
        config.raw.insert(name, value);
    }
    Ok(config)
}

/// Integer coercion that never fails: unparsable values become 0.
fn soft_int(sheet_code: &str, name: &str, value: &Scalar) -> i64 {
    let parsed = match value {
        Scalar::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        Scalar::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
        }
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        if !value.is_null() {
            log::debug!("{sheet_code}: '{name}' = {value:?} is not numeric, using 0");
        }
        0
    })
}

/// Geometry fields are non-negative; negatives clamp to 0.
fn soft_usize(sheet_code: &str, name: &str, value: &Scalar) -> usize {
    soft_int(sheet_code, name, value).max(0) as usize
}
