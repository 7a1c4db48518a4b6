//! Error types and process exit codes.

use crate::status::SolveStatus;
use crate::BackendId;
use hts_core::HtsError;
use thiserror::Error;

/// Process exit codes for CI-style consumption.
///
/// The first six follow [`SolveStatus`] severity order; `InvalidInput` is
/// reserved for configuration errors detected before any solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ExitCode {
    Optimal = 0,
    FeasibleNonOptimal = 1,
    Infeasible = 2,
    Unbounded = 3,
    NotSolved = 4,
    SolverError = 5,
    /// Bad options, unreadable model, unknown backend
    InvalidInput = 64,
}

impl ExitCode {
    pub fn from_status(status: SolveStatus) -> Self {
        match status {
            SolveStatus::Optimal => ExitCode::Optimal,
            SolveStatus::FeasibleNonOptimal => ExitCode::FeasibleNonOptimal,
            SolveStatus::Infeasible => ExitCode::Infeasible,
            SolveStatus::Unbounded => ExitCode::Unbounded,
            SolveStatus::NotSolved => ExitCode::NotSolved,
            SolveStatus::Error => ExitCode::SolverError,
        }
    }

    /// Convert from raw exit code to ExitCode enum.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ExitCode::Optimal,
            1 => ExitCode::FeasibleNonOptimal,
            2 => ExitCode::Infeasible,
            3 => ExitCode::Unbounded,
            4 => ExitCode::NotSolved,
            64 => ExitCode::InvalidInput,
            _ => ExitCode::SolverError, // Unknown codes treated as solver error
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Optimal)
    }
}

/// Errors raised to the caller. Solve outcomes are never errors.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(
        "Unknown backend '{0}'; supported values: {list}",
        list = BackendId::all().iter().map(|b| b.as_str()).collect::<Vec<_>>().join(", ")
    )]
    UnknownBackend(String),

    #[error("Backend {backend} is not available. {hint}")]
    BackendUnavailable { backend: BackendId, hint: String },

    #[error("Invalid solve options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(#[from] HtsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SolverError {
    /// Exit code for a run aborted by this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SolverError::Io(_) => ExitCode::SolverError,
            _ => ExitCode::InvalidInput,
        }
    }
}

/// Result type alias for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
