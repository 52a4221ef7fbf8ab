// Integration tests for the `bilancio` binary.
// Run with: cargo test -p bilancio-cli --test cli_tests -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::json;

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let header = ["tipo_tab", "first_row", "first_col", "nr_row", "nr_col", "row_code_nrcol", "col_code_nrrow"];
        let templates = json!({
            "metadata": {"format": "dense"},
            "sheets": {
                "T0000": [
                    header,
                    [1, 4, 3, 2, 2, 0, 2],
                    [],
                    [],
                    ["RAGIONE_SOCIALE"],
                    ["CODICE_FISCALE"]
                ],
                "T0002": [
                    header,
                    [2, 6, 3, 3, 2, 0, 2],
                    [],
                    [],
                    [null, "Stato patrimoniale"],
                    [null, null, null, "=c_this", "=c_prev"],
                    ["A00"],
                    ["A01"],
                    ["A02"]
                ],
                "T0300": [["tipo_tab"], [4]]
            }
        });
        let mappings = json!({
            "metadata": {"version": "2.0"},
            "mappature": {
                "T0002": [
                    {"code": "A00", "ui": {"label": "Attivo", "indent_level": 0, "is_abstract": true}},
                    {"code": "A01", "ui": {"label": "Crediti", "indent_level": 1}, "xbrl": {"type": "xbrli:monetaryItemType"}},
                    {"code": "A02", "ui": {"label": "Disponibilità liquide", "indent_level": 1}, "xbrl": {"type": "xbrli:monetaryItemType"}}
                ]
            }
        });
        fs::write(dir.path().join("templates.json"), templates.to_string()).unwrap();
        fs::write(dir.path().join("mappings.json"), mappings.to_string()).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn bilancio(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bilancio"))
            .arg("--templates")
            .arg(self.path("templates.json"))
            .arg("--mappings")
            .arg(self.path("mappings.json"))
            .arg("--settings")
            .arg(self.path("settings.json"))
            .args(args)
            .output()
            .expect("run bilancio")
    }

    fn new_document(&self) -> PathBuf {
        let doc = self.path("bilancio.json");
        let out = self.bilancio(&["new", "-o", path_str(&doc), "--year", "2024"]);
        assert!(out.status.success(), "{}", stderr(&out));
        doc
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// sheets / cells
// ---------------------------------------------------------------------------

#[test]
fn sheets_json_lists_every_template() {
    let fx = Fixture::new();
    let out = fx.bilancio(&["sheets", "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let sheets: Vec<serde_json::Value> = serde_json::from_str(&stdout(&out)).expect("valid JSON");
    assert_eq!(sheets.len(), 3);
    assert_eq!(sheets[1]["code"], "T0002");
    assert_eq!(sheets[1]["shape"], "matrix");
    assert_eq!(sheets[1]["cells"], 6);
    assert_eq!(sheets[1]["title"], "Stato patrimoniale");
    assert_eq!(sheets[2]["shape"], "special");
    assert_eq!(sheets[2]["cells"], 0);
}

#[test]
fn cells_json_has_storage_keys_and_a1() {
    let fx = Fixture::new();
    let out = fx.bilancio(&["cells", "T0002", "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let cells: Vec<serde_json::Value> = serde_json::from_str(&stdout(&out)).expect("valid JSON");
    let keys: Vec<&str> = cells.iter().map(|c| c["storage_key"].as_str().unwrap()).collect();
    assert_eq!(
        keys,
        ["A00_c_this", "A00_c_prev", "A01_c_this", "A01_c_prev", "A02_c_this", "A02_c_prev"]
    );
    assert_eq!(cells[2]["a1"], "D8");
    assert_eq!(cells[0]["is_abstract"], true);
}

#[test]
fn entity_sheet_collapses_to_row_codes() {
    let fx = Fixture::new();
    let out = fx.bilancio(&["cells", "T0000"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    let keys: Vec<&str> = text.lines().filter_map(|l| l.split_whitespace().next()).collect();
    assert_eq!(keys, ["RAGIONE_SOCIALE", "CODICE_FISCALE"]);
}

#[test]
fn verbose_flag_logs_to_stderr() {
    let fx = Fixture::new();
    let out = fx.bilancio(&["-vv", "sheets", "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("template set: 3 sheets"), "{}", stderr(&out));
    // stdout stays machine-readable.
    let _: Vec<serde_json::Value> = serde_json::from_str(&stdout(&out)).expect("valid JSON");

    let out = fx.bilancio(&["-q", "sheets", "--json"]);
    assert!(out.status.success());
    assert!(!stderr(&out).contains("template set"));
}

#[test]
fn unknown_sheet_is_a_usage_error() {
    let fx = Fixture::new();
    let out = fx.bilancio(&["cells", "T9999"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("T9999"));
    assert!(stderr(&out).contains("hint:"));
}

#[test]
fn missing_templates_is_an_io_error() {
    let fx = Fixture::new();
    let out = Command::new(env!("CARGO_BIN_EXE_bilancio"))
        .arg("--templates")
        .arg(fx.path("nope.json"))
        .arg("--settings")
        .arg(fx.path("settings.json"))
        .args(["sheets"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
}

// ---------------------------------------------------------------------------
// new / set / show / stats
// ---------------------------------------------------------------------------

#[test]
fn set_then_show_and_stats() {
    let fx = Fixture::new();
    let doc = fx.new_document();
    let doc = path_str(&doc);

    let out = fx.bilancio(&["set", doc, "T0002", "A01_c_this", "1500"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let out = fx.bilancio(&["set", doc, "T0000", "RAGIONE_SOCIALE", "Rossi S.r.l."]);
    assert!(out.status.success(), "{}", stderr(&out));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(doc).unwrap()).unwrap();
    assert_eq!(saved["fogli"]["T0002"]["A01_c_this"], 1500.0);
    assert_eq!(saved["fogli"]["T0000"]["RAGIONE_SOCIALE"], "Rossi S.r.l.");
    assert_eq!(saved["metadata"]["anno_esercizio"], 2024);

    let out = fx.bilancio(&["show", doc, "T0002"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.lines().nth(1).unwrap().contains("2024"));
    assert!(text.contains("Attivo"));
    assert!(text.lines().any(|l| l.starts_with("  Crediti") && l.trim_end().ends_with("1500")));

    let out = fx.bilancio(&["stats", doc, "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let stats: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    // Enterable cells: 2 on T0000, 4 on T0002.
    assert_eq!(stats["total_cells"], 6);
    assert_eq!(stats["filled_cells"], 2);
    assert_eq!(stats["completion_percent"], 33);
}

#[test]
fn invalid_values_are_refused() {
    let fx = Fixture::new();
    let doc = fx.new_document();
    let doc = path_str(&doc);
    let before = fs::read_to_string(doc).unwrap();

    let out = fx.bilancio(&["set", doc, "T0002", "A01_c_this", "molti"]);
    assert_eq!(out.status.code(), Some(5));
    assert!(stderr(&out).contains("A01_c_this"));

    // Abstract rows are not enterable.
    let out = fx.bilancio(&["set", doc, "T0002", "A00_c_this", "1"]);
    assert_eq!(out.status.code(), Some(2));

    assert_eq!(fs::read_to_string(doc).unwrap(), before);
}

#[test]
fn new_refuses_to_overwrite() {
    let fx = Fixture::new();
    let doc = fx.new_document();
    let out = fx.bilancio(&["new", "-o", path_str(&doc)]);
    assert_eq!(out.status.code(), Some(2));
    let out = fx.bilancio(&["new", "-o", path_str(&doc), "--force"]);
    assert!(out.status.success());
}

#[test]
fn settings_supply_the_default_store_path() {
    let fx = Fixture::new();
    let store = fx.path("store").join("current.json");
    let settings = json!({"store.path": store, "log.level": "error"});
    fs::write(fx.path("settings.json"), format!("// local\n{}", settings)).unwrap();

    let out = fx.bilancio(&["new", "--year", "2023"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["anno_esercizio"], 2023);
}

#[test]
fn show_unsupported_sheet_prints_diagnostic() {
    let fx = Fixture::new();
    let doc = fx.new_document();
    let out = fx.bilancio(&["show", path_str(&doc), "T0300"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stdout(&out).contains("tipo_tab 4"));
}

// ---------------------------------------------------------------------------
// export / import / sparsify
// ---------------------------------------------------------------------------

#[test]
fn export_then_import_round_trips() {
    let fx = Fixture::new();
    let doc = fx.new_document();
    let doc = path_str(&doc);
    assert!(fx.bilancio(&["set", doc, "T0002", "A02_c_prev", "-42.5"]).status.success());
    assert!(fx.bilancio(&["set", doc, "T0000", "CODICE_FISCALE", "01234567890"]).status.success());

    let xlsx = fx.path("bilancio.xlsx");
    let out = fx.bilancio(&["export", doc, "-o", path_str(&xlsx)]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("2 cells"), "{}", stderr(&out));

    let back = fx.path("back.json");
    let out = fx.bilancio(&["import", path_str(&xlsx), "-o", path_str(&back)]);
    assert!(out.status.success(), "{}", stderr(&out));

    let imported: serde_json::Value = serde_json::from_str(&fs::read_to_string(&back).unwrap()).unwrap();
    assert_eq!(imported["fogli"]["T0002"]["A02_c_prev"], -42.5);
    assert_eq!(imported["fogli"]["T0000"]["CODICE_FISCALE"], "01234567890");
    assert_eq!(imported["metadata"]["anno_esercizio"], 2024);
}

#[test]
fn sparsify_writes_sparse_document() {
    let fx = Fixture::new();
    let sparse = fx.path("sparse.json");
    let out = fx.bilancio(&["sparsify", path_str(&fx.path("templates.json")), "-o", path_str(&sparse)]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("3 sheets"));

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&sparse).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["format"], "sparse");
    assert!(doc["sheets"]["T0002"]["meta"].is_object());

    // The sparse set resolves the same cells.
    let out = Command::new(env!("CARGO_BIN_EXE_bilancio"))
        .arg("--templates")
        .arg(&sparse)
        .arg("--mappings")
        .arg(fx.path("mappings.json"))
        .arg("--settings")
        .arg(fx.path("settings.json"))
        .args(["cells", "T0002", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    let cells: Vec<serde_json::Value> = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(cells.len(), 6);
}
