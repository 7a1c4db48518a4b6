//! Canonical solve status and the backend-code mapping table.
//!
//! Every backend reports termination in its own vocabulary. [`STATUS_TABLE`]
//! is the one place those codes are mapped onto [`SolveStatus`]; codes that
//! are not in the table map to [`SolveStatus::Error`] and the raw code is kept
//! in [`RawTermination`] for debugging.

use crate::error::ExitCode;
use crate::BackendId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one solve attempt, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal within the requested gap.
    Optimal,
    /// Time, node or gap limit reached with an incumbent.
    FeasibleNonOptimal,
    Infeasible,
    Unbounded,
    /// The backend stopped before producing anything usable.
    NotSolved,
    /// Backend failure or an unmapped termination code.
    Error,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::FeasibleNonOptimal => "feasible_non_optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::NotSolved => "not_solved",
            SolveStatus::Error => "error",
        }
    }

    /// `Optimal` or `FeasibleNonOptimal`: a primal solution is available.
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::FeasibleNonOptimal)
    }

    pub fn exit_code(&self) -> i32 {
        ExitCode::from_status(*self).code()
    }

    /// Map a backend-native code; unmapped codes become `Error`.
    pub fn from_raw(backend: BackendId, code: &str) -> Self {
        Self::lookup(backend, code).unwrap_or_else(|| {
            tracing::warn!(
                backend = backend.as_str(),
                code,
                "unmapped termination code, treating as error"
            );
            SolveStatus::Error
        })
    }

    /// Table lookup without the `Error` default.
    pub fn lookup(backend: BackendId, code: &str) -> Option<Self> {
        STATUS_TABLE
            .iter()
            .find(|(b, c, _)| *b == backend && *c == code)
            .map(|(_, _, s)| *s)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-native termination as reported, before mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTermination {
    pub backend: BackendId,
    pub code: String,
}

impl RawTermination {
    pub fn new(backend: BackendId, code: impl Into<String>) -> Self {
        Self {
            backend,
            code: code.into(),
        }
    }

    pub fn status(&self) -> SolveStatus {
        SolveStatus::from_raw(self.backend, &self.code)
    }
}

impl fmt::Display for RawTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.code)
    }
}

use SolveStatus::*;

/// Every native termination code of every backend.
pub static STATUS_TABLE: &[(BackendId, &str, SolveStatus)] = &[
    // builtin: branch-and-bound over Clarabel relaxations
    (BackendId::Builtin, "optimal", Optimal),
    (BackendId::Builtin, "time_limit", FeasibleNonOptimal),
    (BackendId::Builtin, "node_limit", FeasibleNonOptimal),
    (BackendId::Builtin, "iteration_limit", FeasibleNonOptimal),
    (BackendId::Builtin, "infeasible", Infeasible),
    (BackendId::Builtin, "unbounded", Unbounded),
    (BackendId::Builtin, "numerical_error", Error),
    (BackendId::Builtin, "not_solved", NotSolved),
    // microlp via good_lp
    (BackendId::Microlp, "optimal", Optimal),
    (BackendId::Microlp, "infeasible", Infeasible),
    (BackendId::Microlp, "unbounded", Unbounded),
    (BackendId::Microlp, "error", Error),
    // HiGHS model status names
    (BackendId::Highs, "NotSet", NotSolved),
    (BackendId::Highs, "LoadError", Error),
    (BackendId::Highs, "ModelError", Error),
    (BackendId::Highs, "PresolveError", Error),
    (BackendId::Highs, "SolveError", Error),
    (BackendId::Highs, "PostsolveError", Error),
    (BackendId::Highs, "ModelEmpty", Optimal),
    (BackendId::Highs, "Optimal", Optimal),
    (BackendId::Highs, "Infeasible", Infeasible),
    (BackendId::Highs, "UnboundedOrInfeasible", Infeasible),
    (BackendId::Highs, "Unbounded", Unbounded),
    (BackendId::Highs, "ObjectiveBound", FeasibleNonOptimal),
    (BackendId::Highs, "ObjectiveTarget", FeasibleNonOptimal),
    (BackendId::Highs, "ReachedTimeLimit", FeasibleNonOptimal),
    (BackendId::Highs, "ReachedIterationLimit", FeasibleNonOptimal),
    (BackendId::Highs, "Unknown", Error),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn severity_order() {
        assert!(Optimal < FeasibleNonOptimal);
        assert!(FeasibleNonOptimal < Infeasible);
        assert!(Infeasible < Unbounded);
        assert!(Unbounded < NotSolved);
        assert!(NotSolved < Error);
    }

    #[test]
    fn table_has_no_duplicate_codes() {
        let mut seen = HashSet::new();
        for (backend, code, _) in STATUS_TABLE {
            assert!(
                seen.insert((*backend, *code)),
                "duplicate mapping for {backend}:{code}"
            );
        }
    }

    #[test]
    fn every_backend_maps_an_optimal_code() {
        for backend in BackendId::all() {
            assert!(
                STATUS_TABLE
                    .iter()
                    .any(|(b, _, s)| b == backend && *s == Optimal),
                "{backend} has no optimal code"
            );
        }
    }

    #[test]
    fn unmapped_code_is_error() {
        assert_eq!(SolveStatus::from_raw(BackendId::Highs, "Exploded"), Error);
        assert_eq!(SolveStatus::lookup(BackendId::Highs, "Exploded"), None);
        // codes are scoped per backend
        assert_eq!(SolveStatus::from_raw(BackendId::Microlp, "Optimal"), Error);
    }

    #[test]
    fn raw_termination_keeps_code() {
        let raw = RawTermination::new(BackendId::Highs, "ReachedTimeLimit");
        assert_eq!(raw.status(), FeasibleNonOptimal);
        assert_eq!(raw.to_string(), "highs:ReachedTimeLimit");
    }

    #[test]
    fn has_solution() {
        assert!(Optimal.has_solution());
        assert!(FeasibleNonOptimal.has_solution());
        assert!(!Infeasible.has_solution());
        assert!(!NotSolved.has_solution());
    }
}
