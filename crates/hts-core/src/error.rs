//! Unified error types for model handling.
//!
//! [`HtsError`] covers everything that can go wrong while building, loading or
//! mutating a [`LinearModel`](crate::LinearModel). Solver outcomes such as
//! infeasibility are *not* errors; they are reported as statuses by the solve
//! engine.
//!
//! # Example
//!
//! ```ignore
//! use hts_core::{HtsResult, LinearModel};
//!
//! fn load(path: &str) -> HtsResult<LinearModel> {
//!     let model = LinearModel::load(path)?;
//!     model.validate()?;
//!     Ok(model)
//! }
//! ```

use thiserror::Error;

/// Error type for model operations.
#[derive(Error, Debug)]
pub enum HtsError {
    /// I/O errors (model files, reports)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structural problems in a model (dangling references, inverted bounds, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A variable or constraint id that does not belong to the model
    #[error("Unknown {kind} id {index} (model has {len})")]
    UnknownId {
        kind: &'static str,
        index: usize,
        len: usize,
    },
}

/// Convenience type alias for Results using HtsError.
pub type HtsResult<T> = Result<T, HtsError>;

impl From<serde_json::Error> for HtsError {
    fn from(err: serde_json::Error) -> Self {
        HtsError::Parse(err.to_string())
    }
}
