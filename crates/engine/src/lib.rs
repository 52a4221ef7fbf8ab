pub mod bilancio;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod labels;
pub mod resolver;
pub mod session;
pub mod title;
pub mod value;
pub mod workbook;

pub use bilancio::{Bilancio, BilancioMetadata, BilancioStats, SheetData};
pub use codec::{DisplayContext, DisplayValue, GridCoordinate, ValidationOutcome};
pub use config::{parse_config, ConfigRecord, SheetShape};
pub use error::TemplateError;
pub use grid::{materialize, DenseGrid, TemplateSet};
pub use labels::{LabelEntry, LabelMapping, ValueType};
pub use resolver::{resolve_cells, ResolvedCell, Resolver, SheetLayout};
pub use session::{Session, SessionError};
pub use value::Scalar;
pub use workbook::{SheetCells, WorkbookGrid};
