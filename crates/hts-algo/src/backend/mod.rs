//! Solver backend interface.
//!
//! Every engine the orchestrator can drive implements [`SolverBackend`]. A
//! backend only translates: it receives the model and a [`SolveRequest`],
//! runs one solve, and reports its native termination code with whatever
//! vectors it produced. Mapping codes onto `SolveStatus`, deciding which
//! vectors are trustworthy and logging all happen in the executor.

use hts_core::LinearModel;
use hts_solver_common::{BackendId, OptionValue, SolverError, SolverResult};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub mod builtin;
mod lp;
#[cfg(feature = "solver-highs")]
pub mod highs;
#[cfg(feature = "solver-microlp")]
pub mod microlp;

pub use builtin::BuiltinBackend;

/// Per-call solve parameters, already validated.
#[derive(Debug, Clone)]
pub struct SolveRequest<'a> {
    pub time_limit: Duration,
    /// Absolute deadline derived from `time_limit` when the call started.
    pub deadline: Instant,
    pub mip_gap: f64,
    pub verbosity: u8,
    pub options: &'a BTreeMap<String, OptionValue>,
    /// Warm-start values indexed like the model's variables.
    pub initial: Option<&'a [Option<f64>]>,
}

impl<'a> SolveRequest<'a> {
    pub fn new(time_limit: Duration, options: &'a BTreeMap<String, OptionValue>) -> Self {
        Self {
            time_limit,
            deadline: deadline_after(time_limit),
            mip_gap: 0.0,
            verbosity: 0,
            options,
            initial: None,
        }
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_initial(mut self, initial: Option<&'a [Option<f64>]>) -> Self {
        self.initial = initial;
        self
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// `now + limit`, saturating at one year for effectively unlimited runs.
pub(crate) fn deadline_after(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit.min(Duration::from_secs(86_400 * 365)))
        .unwrap_or(now)
}

/// What a backend hands back before normalisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    /// Native termination code, looked up in the status table.
    pub code: String,
    /// One value per model variable, if the backend produced any.
    pub primal: Option<Vec<f64>>,
    /// One value per model constraint, as d(objective)/d(rhs).
    pub duals: Option<Vec<f64>>,
    pub objective: Option<f64>,
    pub mip_gap: Option<f64>,
    pub nodes: Option<u64>,
}

impl RawOutcome {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// Implements one solver engine.
pub trait SolverBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Every termination code this backend can emit.
    fn native_codes(&self) -> &'static [&'static str];

    fn supports_integers(&self) -> bool {
        true
    }

    /// Whether constraint duals are reported for continuous models.
    fn supports_duals(&self) -> bool;

    /// Whether a deadline-bounded conflict search can be run on this backend.
    fn supports_conflict(&self) -> bool {
        false
    }

    fn supports_warm_start(&self) -> bool {
        false
    }

    /// Reject passthrough options this backend cannot accept.
    fn check_options(&self, _options: &BTreeMap<String, OptionValue>) -> SolverResult<()> {
        Ok(())
    }

    /// Run a single solve. Errors are reserved for invalid input; solver
    /// outcomes are reported through `RawOutcome::code`.
    fn solve(&self, model: &LinearModel, request: &SolveRequest<'_>) -> SolverResult<RawOutcome>;
}

/// Shared helper for backends with a fixed option vocabulary.
pub(crate) fn reject_unknown_options(
    backend: BackendId,
    options: &BTreeMap<String, OptionValue>,
    known: &[(&str, &str)],
) -> SolverResult<()> {
    for (key, value) in options {
        let Some((_, expected)) = known.iter().find(|(name, _)| name == key) else {
            let names: Vec<&str> = known.iter().map(|(n, _)| *n).collect();
            return Err(SolverError::InvalidOptions(format!(
                "unknown option '{key}' for backend {backend}; supported: {}",
                names.join(", ")
            )));
        };
        let ok = match *expected {
            "integer" => value.as_u64().is_some(),
            "float" => value.as_f64().is_some(),
            "bool" => matches!(value, OptionValue::Bool(_)),
            _ => matches!(value, OptionValue::Str(_)),
        };
        if !ok {
            return Err(SolverError::InvalidOptions(format!(
                "option '{key}' for backend {backend} expects {expected}, got {} '{value}'",
                value.kind()
            )));
        }
    }
    Ok(())
}
