// End-to-end addressing scenarios: sparse template document -> resolved cells
// -> storage keys -> workbook cells and back.

use std::collections::BTreeMap;

use bilancio_engine::codec::{to_display_value, to_grid_coordinate, to_storage_key};
use bilancio_engine::workbook::{read_sheet_values, write_sheet_values};
use bilancio_engine::*;
use serde_json::json;

const HEADER: [&str; 7] = [
    "tipo_tab",
    "first_row",
    "first_col",
    "nr_row",
    "nr_col",
    "row_code_nrcol",
    "col_code_nrrow",
];

/// Sparse sheet with the configuration header and extra `(row, col, value)` cells.
fn sparse_sheet(config: [i64; 7], rows: usize, cols: usize, cells: &[(usize, usize, serde_json::Value)]) -> serde_json::Value {
    let cols = cols.max(HEADER.len());
    let mut data: BTreeMap<String, BTreeMap<String, serde_json::Value>> = BTreeMap::new();
    for (i, name) in HEADER.iter().enumerate() {
        data.entry("0".into()).or_default().insert(i.to_string(), json!(name));
        data.entry("1".into()).or_default().insert(i.to_string(), json!(config[i]));
    }
    for (r, c, v) in cells {
        data.entry(r.to_string()).or_default().insert(c.to_string(), v.clone());
    }
    json!({"meta": {"rows": rows, "cols": cols}, "data": data})
}

fn template_set(sheets: Vec<(&str, serde_json::Value)>) -> TemplateSet {
    let sheets: serde_json::Map<String, serde_json::Value> =
        sheets.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    TemplateSet::from_value(json!({"metadata": {"format": "sparse"}, "sheets": sheets})).unwrap()
}

fn resolve(set: &TemplateSet, sheet: &str, labels: &LabelMapping) -> Vec<ResolvedCell> {
    let layout = SheetLayout::load(set, sheet).unwrap();
    Resolver::new(labels).resolve_layout(&layout)
}

fn keys(cells: &[ResolvedCell]) -> Vec<String> {
    cells.iter().map(to_storage_key).collect()
}

#[test]
fn scenario_a_temporal_matrix_exports_one_numeric_cell() {
    let set = template_set(vec![(
        "T0002",
        sparse_sheet(
            [2, 9, 3, 2, 2, 0, 2],
            12,
            6,
            &[(9, 0, json!("A01")), (10, 0, json!("A02"))],
        ),
    )]);
    let labels = LabelMapping::new();
    let cells = resolve(&set, "T0002", &labels);
    assert_eq!(keys(&cells), vec!["A01_c_this", "A01_c_prev", "A02_c_this", "A02_c_prev"]);

    let mut data = BTreeMap::new();
    data.insert("A01_c_this".to_string(), Scalar::Number(100.0));
    let sheet = write_sheet_values(&cells, &data);

    assert_eq!(sheet.len(), 1);
    let (at, value) = sheet.iter().next().unwrap();
    assert_eq!(at, GridCoordinate::new(9, 3));
    assert_eq!(at, to_grid_coordinate(&cells[0]));
    assert_eq!(value, &Scalar::Number(100.0));
}

#[test]
fn scenario_b_sentinel_column_is_skipped() {
    let set = template_set(vec![(
        "T0010",
        sparse_sheet(
            [2, 4, 3, 2, 3, 0, 2],
            6,
            6,
            &[
                (2, 3, json!("x")),
                (2, 4, json!("-")),
                (2, 5, json!("z")),
                (4, 0, json!("R1")),
                (5, 0, json!("R2")),
            ],
        ),
    )]);
    let labels = LabelMapping::new();
    let cells = resolve(&set, "T0010", &labels);
    assert_eq!(keys(&cells), vec!["R1_x", "R1_z", "R2_x", "R2_z"]);
    // The z column keeps its grid position.
    assert_eq!(to_grid_coordinate(&cells[1]), GridCoordinate::new(4, 5));
}

#[test]
fn scenario_c_display_placeholders() {
    let ctx = DisplayContext::default();
    assert_eq!(to_display_value(&Scalar::from("=c2022"), &ctx), DisplayValue::Integer(2022));
    let ctx = DisplayContext::default().with_year(2024);
    assert_eq!(to_display_value(&Scalar::from("=c_this"), &ctx), DisplayValue::Integer(2024));
    assert_eq!(to_display_value(&Scalar::from("=foo"), &ctx), DisplayValue::Text("foo".into()));
}

#[test]
fn matrix_coverage_counts_enterable_cells() {
    let mut layout_cells = vec![(2, 1, json!("k1")), (2, 2, json!("k2")), (2, 3, json!("k3"))];
    for r in 0..4 {
        layout_cells.push((5 + r, 0, json!(format!("ROW{r}"))));
    }
    let set = template_set(vec![("T0020", sparse_sheet([2, 5, 1, 4, 3, 0, 2], 10, 5, &layout_cells))]);

    let mut labels = LabelMapping::new();
    labels.insert("T0020", LabelEntry::new("ROW0", "Header").as_abstract());
    let cells = resolve(&set, "T0020", &labels);

    assert_eq!(cells.len(), 12);
    assert_eq!(cells.iter().filter(|c| c.is_enterable()).count(), 9);
}

#[test]
fn two_columns_without_context_codes_default() {
    let set = template_set(vec![(
        "T0030",
        sparse_sheet([2, 3, 2, 1, 2, 0, 2], 5, 5, &[(3, 0, json!("Q"))]),
    )]);
    let cells = resolve(&set, "T0030", &LabelMapping::new());
    let cols: Vec<_> = cells.iter().map(|c| c.col_code.clone().unwrap()).collect();
    assert_eq!(cols, vec!["c_this", "c_prev"]);
}

#[test]
fn single_field_ignores_data_region_code() {
    let set = template_set(vec![(
        "T0167",
        sparse_sheet(
            [1, 6, 1, 1, 1, 0, 2],
            8,
            6,
            &[(2, 4, json!("T0167.NOTE")), (6, 0, json!("DECOY"))],
        ),
    )]);
    let cells = resolve(&set, "T0167", &LabelMapping::new());
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].col_code, None);
    assert_eq!(cells[0].row_code, "T0167.NOTE");
    assert_eq!(to_grid_coordinate(&cells[0]), GridCoordinate::new(6, 1));
}

#[test]
fn tuple_collapses_without_columns() {
    let set = template_set(vec![(
        "T0040",
        sparse_sheet([3, 3, 2, 2, 4, 0, 2], 6, 7, &[(3, 0, json!("P1")), (4, 0, json!("P2"))]),
    )]);
    let cells = resolve(&set, "T0040", &LabelMapping::new());
    assert_eq!(keys(&cells), vec!["P1", "P2"]);
    assert!(cells.iter().all(|c| c.grid_col == 2));
}

#[test]
fn imported_values_round_trip_through_all_shapes() {
    let set = template_set(vec![
        ("T0000", sparse_sheet([1, 3, 2, 2, 1, 0, 2], 5, 4, &[(3, 0, json!("NAME")), (4, 0, json!("CF"))])),
        ("T0002", sparse_sheet([2, 9, 3, 1, 2, 0, 2], 10, 5, &[(9, 0, json!("A01"))])),
        ("T0040", sparse_sheet([3, 3, 2, 1, 1, 0, 2], 4, 3, &[(3, 0, json!("P1"))])),
    ]);
    let labels = LabelMapping::new();
    let values = [
        ("T0000", "NAME", Scalar::from("Rossi S.p.A.")),
        ("T0002", "A01_c_prev", Scalar::Number(-1234.5)),
        ("T0040", "P1", Scalar::from("testo  con spazi ")),
    ];

    for (sheet, key, value) in values {
        let cells = resolve(&set, sheet, &labels);
        let mut data = BTreeMap::new();
        data.insert(key.to_string(), value.clone());
        let native = write_sheet_values(&cells, &data);
        let back = read_sheet_values(&cells, &native);
        assert_eq!(back.get(key), Some(&value), "{sheet}/{key}");
        assert_eq!(back.len(), 1);
    }
}

#[test]
fn unknown_sheet_and_malformed_sheet_errors() {
    let set = template_set(vec![("BROKEN", json!({"data": {}}))]);
    assert!(matches!(set.get("BROKEN"), Err(TemplateError::MalformedTemplate { .. })));
    assert!(matches!(set.get("NOPE"), Err(TemplateError::UnknownSheet(_))));
}
