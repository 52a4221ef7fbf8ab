//! Plain-text form rendering of a sheet view.

use bilancio_engine::session::{SheetView, ViewCell};

/// Shown in place of a value on abstract (total/heading) rows.
pub const ABSTRACT_MARK: &str = "—";

const MIN_VALUE_WIDTH: usize = 12;
const INDENT: &str = "  ";

/// Render `view` as a fixed-width form: title, column headers, one line per
/// template row with its label indented and its values right-aligned.
pub fn render_form(view: &SheetView) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}  {}  [{}]\n", view.code, view.title.text, view.shape.name()));

    if let Some(diagnostic) = &view.diagnostic {
        out.push_str(&format!("! {}\n", diagnostic));
        return out;
    }
    if view.cells.is_empty() {
        out.push_str("(no cells)\n");
        return out;
    }

    let rows = group_rows(&view.cells);
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(1);

    let labels: Vec<String> = rows.iter().map(|r| row_label(&r[0])).collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let headers: Vec<String> = (0..columns)
        .map(|i| view.headers.get(i).map(|h| h.to_string()).unwrap_or_default())
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(MIN_VALUE_WIDTH)).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell_text(cell).chars().count());
        }
    }

    if headers.iter().any(|h| !h.is_empty()) {
        out.push_str(&pad_right("", label_width));
        for (header, width) in headers.iter().zip(&widths) {
            out.push_str("  ");
            out.push_str(&pad_left(header, *width));
        }
        out.push('\n');
    }

    for (row, label) in rows.iter().zip(&labels) {
        let mut line = pad_right(label, label_width);
        for (i, width) in widths.iter().enumerate() {
            line.push_str("  ");
            let text = row.get(i).map(|c| cell_text(c)).unwrap_or_default();
            line.push_str(&pad_left(&text, *width));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Consecutive cells sharing a template row.
fn group_rows(cells: &[ViewCell]) -> Vec<&[ViewCell]> {
    let mut rows = Vec::new();
    let mut start = 0;
    for i in 1..=cells.len() {
        if i == cells.len() || cells[i].cell.row_offset != cells[start].cell.row_offset {
            rows.push(&cells[start..i]);
            start = i;
        }
    }
    rows
}

fn row_label(cell: &ViewCell) -> String {
    let label = if cell.cell.label.is_empty() { &cell.cell.row_code } else { &cell.cell.label };
    format!("{}{}", INDENT.repeat(cell.cell.indent_level), label)
}

fn cell_text(cell: &ViewCell) -> String {
    if cell.cell.is_abstract {
        return ABSTRACT_MARK.to_string();
    }
    match &cell.value {
        // Multi-line text fields show their first line only.
        Some(v) => v.to_string().lines().next().unwrap_or_default().to_string(),
        None => String::new(),
    }
}

fn pad_right(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{}{}", s, " ".repeat(width.saturating_sub(len)))
}

fn pad_left(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{}{}", " ".repeat(width.saturating_sub(len)), s)
}
