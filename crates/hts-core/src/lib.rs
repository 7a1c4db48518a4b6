//! # hts-core: Scheduling Model Core
//!
//! Data structures shared by the hydrothermal scheduling solve engine.
//!
//! The model-building layer (plants, reservoirs, cascades, market zones) is
//! external; what reaches the engine is a [`LinearModel`]: a minimisation
//! mixed-integer linear program whose variables and constraints live in named
//! groups and are keyed by `(entity, period)`.
//!
//! ## What the engine needs from a model
//!
//! - read access to named variable groups and constraint groups
//! - fixing and unfixing individual variables ([`LinearModel::fix`])
//! - evaluation helpers (objective, activity, violation)
//! - the raw termination of the last solve and whether its duals are valid
//!
//! ## Quick Start
//!
//! ```rust
//! use hts_core::*;
//!
//! let mut model = LinearModel::new("single-zone");
//! let on = model.add_variable("commitment", EntryKey::new("thermal1", 0), VarKind::Binary, 0.0, 1.0, 500.0);
//! let gen = model.add_variable("generation", EntryKey::new("thermal1", 0), VarKind::Continuous, 0.0, 200.0, 30.0);
//! model.add_constraint(
//!     "capacity",
//!     EntryKey::new("thermal1", 0),
//!     vec![Term::new(gen, 1.0), Term::new(on, -200.0)],
//!     Sense::Le,
//!     0.0,
//! )?;
//! model.add_constraint(
//!     "market_balance",
//!     EntryKey::new("zone1", 0),
//!     vec![Term::new(gen, 1.0)],
//!     Sense::Eq,
//!     120.0,
//! )?;
//! model.validate()?;
//! # Ok::<(), HtsError>(())
//! ```

pub mod error;
pub mod model;
pub mod table;

pub use error::{HtsError, HtsResult};
pub use model::{
    Constraint, ConstraintId, LastTermination, LinearModel, Sense, Term, VarId, VarKind, Variable,
};
pub use table::{EntryKey, ValueRow, ValueTable};
