//! Template set and label mapping documents.

use std::fs;
use std::path::Path;

use bilancio_engine::grid::materialize;
use bilancio_engine::{LabelMapping, TemplateError, TemplateSet};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ExchangeError;

pub fn load_templates(path: &Path) -> Result<TemplateSet, ExchangeError> {
    let text = fs::read_to_string(path).map_err(|e| ExchangeError::io(path, e))?;
    let set = TemplateSet::from_json(&text)?;
    log::info!(
        "loaded {} template sheets from {}",
        set.sheet_codes().len(),
        path.display()
    );
    Ok(set)
}

/// Load the label mapping. A missing file is an empty mapping, so sheets
/// still render with their grid labels.
pub fn load_mapping(path: &Path) -> Result<LabelMapping, ExchangeError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("no label mapping at {}, using grid labels", path.display());
            return Ok(LabelMapping::new());
        }
        Err(e) => return Err(ExchangeError::io(path, e)),
    };
    let mapping = LabelMapping::from_json(&text)?;
    log::info!("loaded label mapping for {} sheets", mapping.sheet_count());
    Ok(mapping)
}

/// Size figures for a dense -> sparse conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SparsifyStats {
    pub sheets: usize,
    pub total_cells: usize,
    pub non_null_cells: usize,
    pub dense_bytes: usize,
    pub sparse_bytes: usize,
}

impl SparsifyStats {
    pub fn summary(&self) -> String {
        let pct = |part: usize, whole: usize| {
            if whole == 0 {
                0.0
            } else {
                100.0 * part as f64 / whole as f64
            }
        };
        format!(
            "{} sheets · {} of {} cells non-null ({:.1}%) · {} -> {} bytes ({:.1}% smaller)",
            self.sheets,
            self.non_null_cells,
            self.total_cells,
            pct(self.non_null_cells, self.total_cells),
            self.dense_bytes,
            self.sparse_bytes,
            pct(self.dense_bytes.saturating_sub(self.sparse_bytes), self.dense_bytes),
        )
    }
}

/// Convert every sheet of a template document to the sparse form.
///
/// `config` and `index` members are carried over; `metadata.format` is set
/// to `sparse`. Sheets already in sparse form are re-emitted unchanged in meaning.
pub fn sparsify(doc: &Value) -> Result<(Value, SparsifyStats), ExchangeError> {
    let sheets = doc
        .get("sheets")
        .and_then(Value::as_object)
        .ok_or_else(|| TemplateError::MalformedTemplate {
            sheet: "*".to_string(),
            reason: "template document has no 'sheets' object".to_string(),
        })?;

    let mut stats = SparsifyStats::default();
    let mut sparse_sheets = Map::new();
    for (code, raw) in sheets {
        let grid = materialize(code, raw)?;
        let sparse = serde_json::to_value(grid.to_sparse())?;

        stats.sheets += 1;
        stats.total_cells += grid.height() * grid.width();
        stats.non_null_cells += grid.non_null_cells();
        stats.dense_bytes += serde_json::to_string(raw)?.len();
        stats.sparse_bytes += serde_json::to_string(&sparse)?.len();
        sparse_sheets.insert(code.clone(), sparse);
    }

    let out = json!({
        "metadata": {
            "format": "sparse",
            "version": "2.0",
            "generated": Utc::now().to_rfc3339(),
        },
        "config": doc.get("config").cloned().unwrap_or(Value::Null),
        "index": doc.get("index").cloned().unwrap_or(Value::Null),
        "sheets": sparse_sheets,
    });
    Ok((out, stats))
}

pub fn sparsify_file(input: &Path, output: &Path) -> Result<SparsifyStats, ExchangeError> {
    let text = fs::read_to_string(input).map_err(|e| ExchangeError::io(input, e))?;
    let doc: Value = serde_json::from_str(&text)?;
    let (sparse, stats) = sparsify(&doc)?;
    let out = serde_json::to_string(&sparse)?;
    fs::write(output, out).map_err(|e| ExchangeError::io(output, e))?;
    log::info!("{}", stats.summary());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparsify_keeps_only_non_null_cells() {
        let doc = json!({
            "config": {"k": 1},
            "sheets": {
                "T0001": [["tipo_tab", null, null], [1, null, null], [null, null, "x"]],
                "T0002": {"meta": {"rows": 1, "cols": 1}, "data": {"0": {"0": 5}}}
            }
        });
        let (out, stats) = sparsify(&doc).unwrap();
        assert_eq!(out["metadata"]["format"], "sparse");
        assert_eq!(out["config"]["k"], 1);
        assert_eq!(out["sheets"]["T0001"]["meta"]["rows"], 3);
        assert_eq!(out["sheets"]["T0001"]["data"]["2"]["2"], "x");
        assert!(out["sheets"]["T0001"]["data"].get("1").unwrap().get("1").is_none());
        assert_eq!(stats.sheets, 2);
        assert_eq!(stats.total_cells, 10);
        assert_eq!(stats.non_null_cells, 4);

        let set = TemplateSet::from_value(out).unwrap();
        assert!(set.is_sparse_format());
        assert_eq!(set.get("T0001").unwrap().get(2, 2).as_text(), Some("x"));
    }

    #[test]
    fn missing_mapping_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = load_mapping(&dir.path().join("nope.json")).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn malformed_mapping_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_mapping(&path), Err(ExchangeError::Template(_))));
    }
}
