// bilancio CLI - template inspection, data entry and spreadsheet exchange

mod exit_codes;
mod logger;
mod view;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use bilancio_config::Settings;
use bilancio_engine::{
    Bilancio, LabelMapping, ResolvedCell, Resolver, Scalar, Session, SessionError, SheetLayout, TemplateSet,
};
use bilancio_io::store::{self, AutosaveDebouncer};
use bilancio_io::{export, import, templates, ExchangeError};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use exit_codes::{EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_TEMPLATE, EXIT_USAGE, EXIT_VALIDATION};

#[derive(Parser)]
#[command(name = "bilancio")]
#[command(about = "Financial statement templates: inspect sheets, edit values, exchange spreadsheets")]
#[command(version)]
struct Cli {
    /// Template set JSON (overrides paths.templates)
    #[arg(long, global = true, env = "BILANCIO_TEMPLATES", value_name = "PATH")]
    templates: Option<PathBuf>,

    /// Label mapping JSON (overrides paths.mappings)
    #[arg(long, global = true, env = "BILANCIO_MAPPINGS", value_name = "PATH")]
    mappings: Option<PathBuf>,

    /// Settings file (default: <config dir>/bilancio/settings.json)
    #[arg(long, global = true, env = "BILANCIO_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    /// More diagnostics on stderr (repeatable)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List template sheets with shape, geometry and title
    Sheets {
        #[arg(long)]
        json: bool,
    },

    /// List the resolved cells of a sheet
    #[command(after_help = "\
Examples:
  bilancio cells T0002
  bilancio cells T0002 --json | jq '.[] | select(.is_abstract | not) | .storage_key'")]
    Cells {
        sheet: String,

        #[arg(long)]
        json: bool,
    },

    /// Create an empty Bilancio document
    New {
        /// Output file (default: the store.path setting)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Fiscal year (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print a sheet of a Bilancio document as a form
    Show {
        file: PathBuf,
        sheet: String,

        /// Print the sheet view as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Set one value, validated against the cell's type
    #[command(after_help = "\
Examples:
  bilancio set bilancio.json T0002 A01_c_this 1500
  bilancio set bilancio.json T0000 RAGIONE_SOCIALE 'Rossi S.r.l.'
  bilancio set bilancio.json T0002 A01_c_this ''      # clear")]
    Set {
        file: PathBuf,
        sheet: String,
        key: String,
        value: String,
    },

    /// Build a Bilancio document from a spreadsheet
    Import {
        input: PathBuf,

        /// Output file (default: the store.path setting)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Write a Bilancio document to an xlsx spreadsheet
    Export {
        file: PathBuf,

        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Completion statistics of a Bilancio document
    Stats {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Convert a dense template set into the sparse format
    Sparsify {
        input: PathBuf,

        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    if let Err(e) = logger::init(logger::effective_level(settings.log_level.to_filter(), cli.verbose, cli.quiet)) {
        eprintln!("warning: logging disabled: {e}");
    }

    let paths = Paths {
        templates: cli.templates.unwrap_or_else(|| settings.templates_path.clone()),
        mappings: cli.mappings.unwrap_or_else(|| settings.mappings_path.clone()),
    };

    let result = match cli.command {
        Commands::Sparsify { input, output } => cmd_sparsify(&input, &output, cli.quiet),
        command => Workspace::load(settings, &paths).and_then(|ws| run(&ws, command, cli.quiet)),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(ws: &Workspace, command: Commands, quiet: bool) -> Result<(), CliError> {
    match command {
        Commands::Sheets { json } => cmd_sheets(ws, json),
        Commands::Cells { sheet, json } => cmd_cells(ws, &sheet, json),
        Commands::New { output, year, force } => cmd_new(ws, &ws.store_path(output), year, force),
        Commands::Show { file, sheet, json } => cmd_show(ws, &file, &sheet, json),
        Commands::Set { file, sheet, key, value } => cmd_set(ws, &file, &sheet, &key, &value),
        Commands::Import { input, output } => cmd_import(ws, &input, &ws.store_path(output), quiet),
        Commands::Export { file, output } => cmd_export(ws, &file, &output, quiet),
        Commands::Stats { file, json } => cmd_stats(ws, &file, json),
        Commands::Sparsify { input, output } => cmd_sparsify(&input, &output, quiet),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self { code: EXIT_TEMPLATE, message: msg.into(), hint: None }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self { code: EXIT_VALIDATION, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ExchangeError> for CliError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Io { .. } | ExchangeError::Spreadsheet(_) => CliError::io(err.to_string()),
            ExchangeError::Json(_) | ExchangeError::Template(_) => CliError::template(err.to_string()),
        }
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match &err {
            SessionError::UnknownSheet(_) => {
                CliError::args(err.to_string()).with_hint("list sheet codes with: bilancio sheets")
            }
            SessionError::NotEnterable { sheet, .. } => CliError::args(err.to_string())
                .with_hint(format!("list enterable keys with: bilancio cells {}", sheet)),
            SessionError::Template(_) => CliError::template(err.to_string()),
        }
    }
}

// ============================================================================
// Workspace: templates, labels, settings
// ============================================================================

struct Paths {
    templates: PathBuf,
    mappings: PathBuf,
}

struct Workspace {
    settings: Settings,
    templates: TemplateSet,
    labels: LabelMapping,
}

impl Workspace {
    fn load(settings: Settings, paths: &Paths) -> Result<Self, CliError> {
        let templates = templates::load_templates(&paths.templates).map_err(|e| {
            CliError::from(e).with_hint(format!(
                "pass --templates or set \"paths.templates\" in {}",
                Settings::config_path().display()
            ))
        })?;
        let labels = templates::load_mapping(&paths.mappings)?;
        log::debug!(
            "{} template sheets, labels for {} sheets",
            templates.sheet_codes().len(),
            labels.sheet_count()
        );
        Ok(Self { settings, templates, labels })
    }

    fn store_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.settings.store_path.clone())
    }

    fn resolver(&self) -> Resolver<'_> {
        self.settings.resolver(&self.labels)
    }

    fn session(&self, bilancio: Bilancio) -> Session<'_> {
        Session::new(&self.templates, self.resolver(), bilancio)
    }
}

fn write_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::general(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// sheets / cells
// ============================================================================

#[derive(Serialize)]
struct SheetSummary {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_tab: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<[usize; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cells: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn sheet_summary(ws: &Workspace, resolver: &Resolver<'_>, code: &str) -> SheetSummary {
    match SheetLayout::load(&ws.templates, code) {
        Ok(layout) => {
            let config = &layout.config;
            SheetSummary {
                code: code.to_string(),
                shape: Some(config.tipo_tab.name()),
                tipo_tab: Some(config.tipo_tab.code()),
                geometry: Some([config.first_row, config.first_col, config.nr_row, config.nr_col]),
                title: Some(resolver.title(&layout).text),
                cells: Some(resolver.resolve_layout(&layout).len()),
                error: None,
            }
        }
        Err(e) => SheetSummary {
            code: code.to_string(),
            shape: None,
            tipo_tab: None,
            geometry: None,
            title: None,
            cells: None,
            error: Some(e.to_string()),
        },
    }
}

fn cmd_sheets(ws: &Workspace, json: bool) -> Result<(), CliError> {
    let resolver = ws.resolver();
    let summaries: Vec<SheetSummary> = ws
        .templates
        .sheet_codes()
        .iter()
        .map(|code| sheet_summary(ws, &resolver, code))
        .collect();

    if json {
        return write_json(&summaries);
    }
    for s in &summaries {
        match (&s.error, s.geometry) {
            (Some(err), _) => println!("{:<8} error: {}", s.code, err),
            (None, Some([first_row, first_col, nr_row, nr_col])) => println!(
                "{:<8} {:<8} {:>4}x{:<3} @{},{:<4} {:>5} cells  {}",
                s.code,
                s.shape.unwrap_or_default(),
                nr_row,
                nr_col,
                first_row,
                first_col,
                s.cells.unwrap_or_default(),
                s.title.as_deref().unwrap_or_default(),
            ),
            (None, None) => println!("{}", s.code),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CellEntry<'c> {
    storage_key: String,
    a1: String,
    #[serde(flatten)]
    cell: &'c ResolvedCell,
}

fn cmd_cells(ws: &Workspace, sheet: &str, json: bool) -> Result<(), CliError> {
    let layout = SheetLayout::load(&ws.templates, sheet).map_err(SessionError::from)?;
    let cells = ws.resolver().resolve_layout(&layout);

    if json {
        let entries: Vec<CellEntry<'_>> = cells
            .iter()
            .map(|cell| CellEntry {
                storage_key: cell.storage_key(),
                a1: cell.coordinate().a1(),
                cell,
            })
            .collect();
        return write_json(&entries);
    }

    if cells.is_empty() {
        eprintln!("{}: no resolvable cells ({} shape)", sheet, layout.config.tipo_tab.name());
        return Ok(());
    }
    for cell in &cells {
        let flag = if cell.is_abstract { " (abstract)" } else { "" };
        println!(
            "{:<24} {:<6} {}{}{}",
            cell.storage_key(),
            cell.coordinate().a1(),
            "  ".repeat(cell.indent_level),
            cell.label,
            flag
        );
    }
    Ok(())
}

// ============================================================================
// new / show / set / stats
// ============================================================================

fn cmd_new(ws: &Workspace, output: &Path, year: Option<i32>, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        return Err(CliError::args(format!("{} already exists", output.display()))
            .with_hint("use --force to overwrite"));
    }
    let now = Utc::now();
    let mut bilancio = Bilancio::new(now).with_sheets(ws.templates.sheet_codes().iter().cloned());
    if let Some(year) = year {
        bilancio.metadata.anno_esercizio = Some(year);
    }
    store::save(&mut bilancio, output, now)?;
    log::info!("created {} ({} sheets)", output.display(), bilancio.fogli.len());
    Ok(())
}

fn cmd_show(ws: &Workspace, file: &Path, sheet: &str, json: bool) -> Result<(), CliError> {
    let session = ws.session(store::load(file)?);
    let sheet_view = session.view(sheet)?;
    if json {
        return write_json(&sheet_view);
    }
    print!("{}", view::render_form(&sheet_view));
    Ok(())
}

/// Numeric cells take numbers; anything that doesn't parse is passed through
/// as text so validation can reject it with a message.
fn parse_input(raw: &str, cell: &ResolvedCell) -> Scalar {
    if raw.trim().is_empty() {
        return Scalar::Null;
    }
    if cell.value_type.is_numeric() {
        if let Some(n) = Scalar::from(raw).as_number() {
            return Scalar::Number(n);
        }
    }
    Scalar::from(raw)
}

fn cmd_set(ws: &Workspace, file: &Path, sheet: &str, key: &str, raw: &str) -> Result<(), CliError> {
    let mut session = ws.session(store::load(file)?);
    let mut autosave = AutosaveDebouncer::from_millis(ws.settings.autosave_debounce_ms);

    let cells = session.resolved_cells(sheet)?;
    let value = match cells.iter().find(|c| c.storage_key() == key) {
        Some(cell) => parse_input(raw, cell),
        None => Scalar::from(raw),
    };
    let previous = session.value(sheet, key).cloned();

    let outcome = session.set_value(sheet, key, value.clone())?;
    if !outcome.valid {
        let message = outcome.message.unwrap_or_else(|| format!("{}: invalid value", key));
        return Err(CliError::validation(message));
    }
    if session.revision() > 0 {
        autosave.note_edit(Instant::now());
    }

    // One edit per invocation: flush the pending save before exiting.
    if autosave.flush() {
        let mut bilancio = session.into_bilancio();
        store::save(&mut bilancio, file, Utc::now())?;
    }
    println!(
        "{}/{}: {} -> {}",
        sheet,
        key,
        previous.map(|v| v.to_string()).unwrap_or_default(),
        value
    );
    Ok(())
}

fn cmd_stats(ws: &Workspace, file: &Path, json: bool) -> Result<(), CliError> {
    let session = ws.session(store::load(file)?);
    let stats = session.stats();
    if json {
        return write_json(&stats);
    }
    println!(
        "{} of {} cells filled ({}%) · last modified {}",
        stats.filled_cells,
        stats.total_cells,
        stats.completion_percent,
        stats.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

// ============================================================================
// import / export / sparsify
// ============================================================================

fn cmd_import(ws: &Workspace, input: &Path, output: &Path, quiet: bool) -> Result<(), CliError> {
    let (mut bilancio, report) = import::import_file(
        input,
        &ws.templates,
        &ws.resolver(),
        &ws.settings.context_locations,
        Utc::now(),
    )?;
    store::save(&mut bilancio, output, Utc::now())?;
    if !quiet {
        eprintln!("imported {}: {}", input.display(), report.summary());
        for skipped in &report.skipped {
            eprintln!("  skipped {}: {}", skipped.sheet, skipped.reason);
        }
    }
    Ok(())
}

fn cmd_export(ws: &Workspace, file: &Path, output: &Path, quiet: bool) -> Result<(), CliError> {
    let bilancio = store::load(file)?;
    let report = export::export_file(
        &bilancio,
        &ws.templates,
        &ws.resolver(),
        &ws.settings.context_locations,
        output,
    )?;
    if !quiet {
        eprintln!("exported {}: {}", output.display(), report.summary());
        for skipped in &report.skipped {
            eprintln!("  skipped {}: {}", skipped.sheet, skipped.reason);
        }
    }
    Ok(())
}

fn cmd_sparsify(input: &Path, output: &Path, quiet: bool) -> Result<(), CliError> {
    let stats = templates::sparsify_file(input, output)?;
    if !quiet {
        eprintln!("{}", stats.summary());
    }
    Ok(())
}
