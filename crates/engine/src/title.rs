//! Sheet title lookup.
//!
//! Templates never settled on one title position: revisions put it on the
//! row just above the data region, on row 6, or on row 4. The search order
//! is a policy; every plausible candidate is collected so that sheets with
//! several competing titles can be flagged.

use serde::{Deserialize, Serialize};

use crate::config::ConfigRecord;
use crate::grid::DenseGrid;

const MIN_TITLE_CHARS: usize = 3;
const MAX_TITLE_CHARS: usize = 100;
/// Dotted all-caps tokens at least this long are taken to be codes.
const CODE_LIKE_MIN_CHARS: usize = 8;

/// One position to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TitleCandidate {
    /// The row immediately above `first_row`.
    PrecedingRow { col: usize },
    /// A fixed grid position.
    Fixed { row: usize, col: usize },
}

/// Ordered list of title candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePolicy {
    pub order: Vec<TitleCandidate>,
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self {
            order: vec![
                TitleCandidate::PrecedingRow { col: 1 },
                TitleCandidate::Fixed { row: 6, col: 1 },
                TitleCandidate::Fixed { row: 4, col: 1 },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    Grid { row: usize, col: usize },
    SheetCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetTitle {
    pub text: String,
    pub source: TitleSource,
    /// More than one distinct plausible candidate was found.
    pub ambiguous: bool,
}

/// Find the sheet title following `policy`; falls back to the sheet code.
pub fn resolve_title(
    grid: &DenseGrid,
    config: &ConfigRecord,
    sheet_code: &str,
    policy: &TitlePolicy,
) -> SheetTitle {
    let mut found: Vec<(String, usize, usize)> = Vec::new();

    for candidate in &policy.order {
        let (row, col) = match *candidate {
            TitleCandidate::PrecedingRow { col } => {
                if config.first_row == 0 {
                    continue;
                }
                (config.first_row - 1, col)
            }
            TitleCandidate::Fixed { row, col } => (row, col),
        };
        let Some(text) = grid.get(row, col).as_text() else { continue };
        let text = text.trim();
        if is_plausible_title(text) && !found.iter().any(|(t, r, c)| t == text || (*r, *c) == (row, col)) {
            found.push((text.to_string(), row, col));
        }
    }

    match found.first() {
        Some((text, row, col)) => {
            let ambiguous = found.len() > 1;
            if ambiguous {
                log::warn!(
                    "{sheet_code}: {} title candidates, using '{}' at ({}, {})",
                    found.len(),
                    text,
                    row,
                    col
                );
            }
            SheetTitle {
                text: text.clone(),
                source: TitleSource::Grid { row: *row, col: *col },
                ambiguous,
            }
        }
        None => SheetTitle {
            text: sheet_code.to_string(),
            source: TitleSource::SheetCode,
            ambiguous: false,
        },
    }
}

/// A title is 3..=100 characters and doesn't look like a formula or a code.
pub fn is_plausible_title(text: &str) -> bool {
    let len = text.chars().count();
    if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) {
        return false;
    }
    if text.starts_with('=') {
        return false;
    }
    !looks_like_code(text)
}

fn looks_like_code(text: &str) -> bool {
    text.len() >= CODE_LIKE_MIN_CHARS
        && text.contains('.')
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '_')
}
