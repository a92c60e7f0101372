//! Layout error types.

use thiserror::Error;

/// Errors produced while preparing or running a layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A settings field is negative or not a finite number.
    #[error("invalid layout setting '{field}': {value}")]
    InvalidSetting { field: &'static str, value: f64 },
}
