use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Sheet or template document is structurally invalid (e.g. sparse sheet without `meta`).
    MalformedTemplate { sheet: String, reason: String },
    /// Configuration header rows are absent or not sequences.
    InvalidConfig { sheet: String, reason: String },
    /// Shape code outside the supported set, raised only by strict callers.
    UnsupportedShape { sheet: String, tipo_tab: i64 },
    /// No template sheet with this code in the loaded set.
    UnknownSheet(String),
    /// Label mapping document could not be parsed.
    MalformedMapping(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTemplate { sheet, reason } => {
                write!(f, "malformed template '{sheet}': {reason}")
            }
            Self::InvalidConfig { sheet, reason } => {
                write!(f, "invalid configuration in '{sheet}': {reason}")
            }
            Self::UnsupportedShape { sheet, tipo_tab } => {
                write!(f, "sheet '{sheet}': unsupported tipo_tab {tipo_tab}")
            }
            Self::UnknownSheet(code) => write!(f, "no template for sheet '{code}'"),
            Self::MalformedMapping(msg) => write!(f, "malformed label mapping: {msg}"),
        }
    }
}

impl std::error::Error for TemplateError {}
