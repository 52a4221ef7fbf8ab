// File I/O: template and mapping documents, spreadsheet exchange, Bilancio persistence

pub mod error;
pub mod export;
pub mod import;
pub mod store;
pub mod templates;
pub mod xlsx;

pub use error::ExchangeError;
