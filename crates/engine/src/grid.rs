//! Template grids: sparse/dense sheet formats and the lazy per-sheet cache.
//!
//! Template documents store most sheets in a sparse form
//! (`{meta: {rows, cols}, data: {row: {col: value}}}`) because the dense
//! arrays are overwhelmingly null. A [`TemplateSet`] keeps the raw JSON and
//! materializes a [`DenseGrid`] the first time a sheet is requested; later
//! requests hit the cache. A loaded set is immutable, so the cache is never
//! invalidated.

use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TemplateError;
use crate::value::{Scalar, NULL};

// ============================================================================
// Dense grid
// ============================================================================

/// A uniform 2D grid of template cells.
///
/// Rows are `None` when the source row was not a sequence; such rows read as
/// all-null but the configuration parser rejects them for the header rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenseGrid {
    rows: Vec<Option<Vec<Scalar>>>,
}

impl DenseGrid {
    /// `rows x cols` grid with every cell null.
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows: (0..rows).map(|_| Some(vec![Scalar::Null; cols])).collect(),
        }
    }

    pub fn from_rows(rows: Vec<Vec<Scalar>>) -> Self {
        Self {
            rows: rows.into_iter().map(Some).collect(),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.as_ref().map_or(0, |r| r.len()))
            .max()
            .unwrap_or(0)
    }

    /// Row slice, or `None` if out of range or the row is not a sequence.
    pub fn row(&self, row: usize) -> Option<&[Scalar]> {
        self.rows.get(row).and_then(|r| r.as_deref())
    }

    /// Cell at (row, col); null outside the grid.
    pub fn get(&self, row: usize, col: usize) -> &Scalar {
        self.row(row).and_then(|r| r.get(col)).unwrap_or(&NULL)
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: Scalar) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, || Some(Vec::new()));
        }
        let slot = self.rows[row].get_or_insert_with(Vec::new);
        if slot.len() <= col {
            slot.resize(col + 1, Scalar::Null);
        }
        slot[col] = value;
    }

    /// Number of non-null cells.
    pub fn non_null_cells(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .map(|r| r.iter().filter(|v| !v.is_null()).count())
            .sum()
    }

    /// Sparse form: only non-null cells are kept.
    pub fn to_sparse(&self) -> SparseSheet {
        let mut data: BTreeMap<String, BTreeMap<String, Scalar>> = BTreeMap::new();
        for (r, row) in self.rows.iter().enumerate() {
            let Some(row) = row else { continue };
            let cells: BTreeMap<String, Scalar> = row
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(c, v)| (c.to_string(), v.clone()))
                .collect();
            if !cells.is_empty() {
                data.insert(r.to_string(), cells);
            }
        }
        SparseSheet {
            meta: SheetMeta {
                rows: self.height(),
                cols: self.width(),
            },
            data,
        }
    }
}

// ============================================================================
// Sparse sheet
// ============================================================================

/// Upper bound on `meta.rows * meta.cols` for a sparse sheet.
pub const MAX_SPARSE_CELLS: usize = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMeta {
    pub rows: usize,
    pub cols: usize,
}

/// Serialized sparse form. Keys are stringified indices, as in the JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseSheet {
    pub meta: SheetMeta,
    #[serde(default)]
    pub data: BTreeMap<String, BTreeMap<String, Scalar>>,
}

/// Convert one raw template sheet (sparse object or dense array) into a dense grid.
///
/// Sparse entries whose indices don't parse or fall outside `meta` are
/// dropped. A missing `data` member is an empty sheet. A `meta` whose area
/// exceeds [`MAX_SPARSE_CELLS`] is malformed.
pub fn materialize(sheet_code: &str, raw: &Value) -> Result<DenseGrid, TemplateError> {
    match raw {
        Value::Array(rows) => Ok(DenseGrid {
            rows: rows
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => Some(cells.iter().map(Scalar::from_json).collect()),
                    _ => None,
                })
                .collect(),
        }),
        Value::Object(obj) => {
            let meta = obj.get("meta").ok_or_else(|| TemplateError::MalformedTemplate {
                sheet: sheet_code.to_string(),
                reason: "sparse sheet has no 'meta'".to_string(),
            })?;
            let meta: SheetMeta =
                serde_json::from_value(meta.clone()).map_err(|e| TemplateError::MalformedTemplate {
                    sheet: sheet_code.to_string(),
                    reason: format!("invalid 'meta': {e}"),
                })?;

            match meta.rows.checked_mul(meta.cols) {
                Some(cells) if cells <= MAX_SPARSE_CELLS => {}
                _ => {
                    return Err(TemplateError::MalformedTemplate {
                        sheet: sheet_code.to_string(),
                        reason: format!(
                            "'meta' declares {} x {} cells, limit is {MAX_SPARSE_CELLS}",
                            meta.rows, meta.cols
                        ),
                    })
                }
            }

            let mut grid = DenseGrid::empty(meta.rows, meta.cols);
            let Some(Value::Object(data)) = obj.get("data") else {
                return Ok(grid);
            };
            for (row_key, row_data) in data {
                let Ok(r) = row_key.parse::<usize>() else { continue };
                let Value::Object(cells) = row_data else { continue };
                if r >= meta.rows {
                    continue;
                }
                for (col_key, value) in cells {
                    let Ok(c) = col_key.parse::<usize>() else { continue };
                    if c < meta.cols {
                        grid.set(r, c, Scalar::from_json(value));
                    }
                }
            }
            Ok(grid)
        }
        _ => Err(TemplateError::MalformedTemplate {
            sheet: sheet_code.to_string(),
            reason: "expected a sparse object or a dense array".to_string(),
        }),
    }
}

// ============================================================================
// Template set (lazy cache)
// ============================================================================

/// Loader statistics, mirroring what the cache has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub total_sheets: usize,
    pub loaded_sheets: usize,
    pub cache_hits: usize,
}

#[derive(Debug)]
struct CachedSheet {
    raw: Value,
    dense: OnceCell<DenseGrid>,
}

/// All template sheets of one template document, addressable by sheet code.
#[derive(Debug, Default)]
pub struct TemplateSet {
    order: Vec<String>,
    sheets: FxHashMap<String, CachedSheet>,
    sparse_format: bool,
    loaded: Cell<usize>,
    hits: Cell<usize>,
}

impl TemplateSet {
    /// Parse a template document: `{metadata?, config?, index?, sheets: {code: sheet}}`.
    pub fn from_json(input: &str) -> Result<Self, TemplateError> {
        let doc: Value = serde_json::from_str(input).map_err(|e| TemplateError::MalformedTemplate {
            sheet: "*".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_value(doc)
    }

    pub fn from_value(doc: Value) -> Result<Self, TemplateError> {
        let Value::Object(mut doc) = doc else {
            return Err(TemplateError::MalformedTemplate {
                sheet: "*".to_string(),
                reason: "template document must be an object".to_string(),
            });
        };
        let declared_sparse = doc
            .get("metadata")
            .and_then(|m| m.get("format"))
            .and_then(Value::as_str)
            == Some("sparse");
        let Some(Value::Object(sheets)) = doc.remove("sheets") else {
            return Err(TemplateError::MalformedTemplate {
                sheet: "*".to_string(),
                reason: "template document has no 'sheets' object".to_string(),
            });
        };

        let first_is_sparse = sheets
            .values()
            .next()
            .and_then(Value::as_object)
            .is_some_and(|s| s.contains_key("meta") && s.contains_key("data"));

        let mut set = TemplateSet {
            sparse_format: declared_sparse || first_is_sparse,
            ..Default::default()
        };
        for (code, raw) in sheets {
            set.order.push(code.clone());
            set.sheets.insert(code, CachedSheet { raw, dense: OnceCell::new() });
        }
        log::debug!(
            "template set: {} sheets ({} format)",
            set.order.len(),
            if set.sparse_format { "sparse" } else { "dense" }
        );
        Ok(set)
    }

    /// Build a set from already-dense grids (these count as loaded).
    pub fn from_grids<I, S>(grids: I) -> Self
    where
        I: IntoIterator<Item = (S, DenseGrid)>,
        S: Into<String>,
    {
        let mut set = TemplateSet::default();
        for (code, grid) in grids {
            let code = code.into();
            let dense = OnceCell::new();
            let _ = dense.set(grid);
            set.order.push(code.clone());
            set.sheets.insert(code, CachedSheet { raw: Value::Null, dense });
        }
        set.loaded.set(set.order.len());
        set
    }

    /// Dense grid for a sheet, materialized on first access.
    pub fn get(&self, sheet_code: &str) -> Result<&DenseGrid, TemplateError> {
        let cached = self
            .sheets
            .get(sheet_code)
            .ok_or_else(|| TemplateError::UnknownSheet(sheet_code.to_string()))?;

        if let Some(grid) = cached.dense.get() {
            self.hits.set(self.hits.get() + 1);
            return Ok(grid);
        }

        let grid = materialize(sheet_code, &cached.raw)?;
        self.loaded.set(self.loaded.get() + 1);
        log::debug!(
            "loaded sheet {} ({}/{})",
            sheet_code,
            self.loaded.get(),
            self.order.len()
        );
        Ok(cached.dense.get_or_init(|| grid))
    }

    pub fn contains(&self, sheet_code: &str) -> bool {
        self.sheets.contains_key(sheet_code)
    }

    /// Sheet codes in document order.
    pub fn sheet_codes(&self) -> &[String] {
        &self.order
    }

    pub fn is_sparse_format(&self) -> bool {
        self.sparse_format
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            total_sheets: self.order.len(),
            loaded_sheets: self.loaded.get(),
            cache_hits: self.hits.get(),
        }
    }
}
