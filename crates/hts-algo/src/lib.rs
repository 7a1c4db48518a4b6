//! # hts-algo: Solve Orchestration and Pricing
//!
//! Runs a hydrothermal unit-commitment model through a solver backend,
//! derives marginal prices with a two-stage solve, and explains infeasible
//! models.
//!
//! ## Workflow
//!
//! | Step | Component | Result |
//! |------|-----------|--------|
//! | 1 | [`SolverRegistry`] | backend resolved (or fallback to builtin) |
//! | 2 | [`executor::execute`] on the integer model | commitment [`SolveResult`] |
//! | 3 | [`PricingCoordinator`] pins integers in a [`FixGuard`] | pricing [`SolveResult`] with duals |
//! | 4 | [`extract`] | [`PriceTable`], [`CostBreakdown`], series |
//!
//! If the commitment solve is infeasible, [`diagnose()`] searches for a
//! minimal conflicting set of constraints and bounds, and [`write_report`]
//! renders it for a human.
//!
//! ### Architecture
//!
//! - **[`backend::SolverBackend`]**: one engine (builtin Clarabel B&B,
//!   microlp, HiGHS); reports native termination codes only
//! - **[`SolverRegistry`]**: feature-gated backends behind write-once
//!   availability slots
//! - **[`Orchestrator`]**: validation, backend selection, log file, costs
//!
//! [`SolveResult`]: hts_solver_common::SolveResult
//!
//! ## Example
//!
//! ```rust
//! use hts_algo::{solve, SolveOptions};
//! use hts_core::{EntryKey, LinearModel, Sense, Term, VarKind};
//!
//! let mut model = LinearModel::new("one-zone");
//! let on = model.add_variable("commitment", EntryKey::new("g1", 0), VarKind::Binary, 0.0, 1.0, 200.0);
//! let gen = model.add_variable("generation", EntryKey::new("g1", 0), VarKind::Continuous, 0.0, 150.0, 25.0);
//! model.add_constraint("capacity", EntryKey::new("g1", 0), vec![Term::new(gen, 1.0), Term::new(on, -150.0)], Sense::Le, 0.0)?;
//! model.add_constraint("market_balance", EntryKey::new("zone", 0), vec![Term::new(gen, 1.0)], Sense::Eq, 100.0)?;
//!
//! let dir = tempfile::tempdir()?;
//! let result = solve(&mut model, &SolveOptions::default().with_log_dir(dir.path()))?;
//! let price = result.prices.get("zone", 0).and_then(|row| row.price);
//! assert!(price.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod diagnose;
pub mod executor;
pub mod extract;
pub mod log;
pub mod orchestrator;
pub mod pricing;
pub mod registry;

pub use backend::{BuiltinBackend, RawOutcome, SolveRequest, SolverBackend};
pub use diagnose::{write_report, ConflictKind, IisConflict, IisResult, IisStatus};
pub use extract::{
    cost_breakdown, price_table, series, CostBreakdown, CostComponent, CostParameters, CostTerm,
    PriceFilter, PriceRow, PriceTable,
};
pub use log::SolveLog;
pub use orchestrator::Orchestrator;
pub use pricing::{FixGuard, PricingCoordinator, PricingPhase, TwoStageResult};
pub use registry::{BackendInfo, SolverRegistry};

pub use hts_solver_common::{BackendId, SolveOptions, SolveResult, SolveStatus, SolverError};

use hts_core::LinearModel;
use hts_solver_common::SolverResult;

/// Solve with the process-wide registry. See [`Orchestrator::solve`].
pub fn solve(model: &mut LinearModel, options: &SolveOptions) -> SolverResult<TwoStageResult> {
    Orchestrator::default().solve(model, options)
}

/// Diagnose with the process-wide registry. See [`Orchestrator::diagnose`].
pub fn diagnose(model: &LinearModel, options: &SolveOptions) -> IisResult {
    Orchestrator::default().diagnose(model, options)
}
