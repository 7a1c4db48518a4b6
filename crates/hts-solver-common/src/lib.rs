//! Common types shared by the hts solve engine and its backends.
//!
//! This crate owns the vocabulary every backend is normalised onto:
//!
//! - [`BackendId`]: the closed set of solver backends the engine knows about
//! - [`SolveStatus`]: the canonical termination taxonomy, with the single
//!   backend-code mapping table in [`status`]
//! - [`SolveOptions`]: the immutable configuration of one solve call
//! - [`SolveResult`]: the immutable outcome of one solve attempt
//! - [`SolverError`]: configuration and availability errors
//!
//! # Backends
//!
//! | Backend | Feature | Problem Type | Duals | Conflict search |
//! |---------|---------|--------------|-------|-----------------|
//! | builtin | always | LP/MIP | yes (LP) | yes |
//! | microlp | `solver-microlp` | LP/MIP | no | no |
//! | HiGHS   | `solver-highs` | LP/MIP | yes (LP) | yes |
//!
//! The builtin backend solves LP relaxations with Clarabel (Goulart et al.,
//! 2024) and handles integrality with branch-and-bound. HiGHS (Huangfu &
//! Hall, 2018, doi:[10.1007/s12532-017-0130-5]) is linked natively when its
//! feature is enabled.
//!
//! [10.1007/s12532-017-0130-5]: https://doi.org/10.1007/s12532-017-0130-5

pub mod error;
pub mod options;
pub mod result;
pub mod status;

pub use error::{ExitCode, SolverError, SolverResult};
pub use options::{parse_option_pair, OptionValue, SolveOptions};
pub use result::SolveResult;
pub use status::{RawTermination, SolveStatus};

/// Solver backends known to the engine.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Clarabel LP relaxations under a depth-first branch-and-bound.
    ///
    /// Always compiled in; the fallback when an optional backend is missing.
    #[default]
    Builtin,

    /// Pure-Rust simplex with branch-and-bound, driven through `good_lp`.
    ///
    /// No dual values and no time limit.
    Microlp,

    /// HiGHS - dual revised simplex (LP) and branch-and-cut (MIP).
    ///
    /// **Reference:** Huangfu, Q., & Hall, J. A. J. (2018). Parallelizing the dual
    /// revised simplex method. *Mathematical Programming Computation*, 10(1), 119-142.
    Highs,
}

impl BackendId {
    /// Identifier used in configuration files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Builtin => "builtin",
            BackendId::Microlp => "microlp",
            BackendId::Highs => "highs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendId::Builtin => "Builtin",
            BackendId::Microlp => "microlp",
            BackendId::Highs => "HiGHS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BackendId::Builtin => "Clarabel LP + branch-and-bound",
            BackendId::Microlp => "pure-Rust simplex MIP",
            BackendId::Highs => "LP/MIP high-performance",
        }
    }

    /// Cargo feature that compiles the backend in (`None` for builtin).
    pub fn cargo_feature(&self) -> Option<&'static str> {
        match self {
            BackendId::Builtin => None,
            BackendId::Microlp => Some("solver-microlp"),
            BackendId::Highs => Some("solver-highs"),
        }
    }

    /// Hint printed when the backend cannot be used.
    pub fn install_hint(&self) -> String {
        match self.cargo_feature() {
            Some(feature) => format!("Rebuild with `--features {feature}`"),
            None => String::new(),
        }
    }

    pub fn all() -> &'static [BackendId] {
        &[BackendId::Builtin, BackendId::Microlp, BackendId::Highs]
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendId {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "builtin" | "default" => Ok(BackendId::Builtin),
            "microlp" => Ok(BackendId::Microlp),
            "highs" => Ok(BackendId::Highs),
            _ => Err(SolverError::UnknownBackend(s.to_string())),
        }
    }
}
