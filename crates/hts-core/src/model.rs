//! Mixed-integer linear model.
//!
//! A [`LinearModel`] is what the model-building layer hands to the solve
//! engine: variables and constraints organised in named groups
//! (`commitment`, `generation`, `storage`, `market_balance`, ...), each
//! instance keyed by entity and period. The objective is always minimised.
//!
//! Besides the mathematical content the model carries the state of its last
//! solve: the backend's raw termination code, whether duals are valid, and the
//! primal/dual vectors. That state is not serialized.
//!
//! ```
//! use hts_core::{EntryKey, LinearModel, Sense, Term, VarKind};
//!
//! let mut model = LinearModel::new("two-plant");
//! let g1 = model.add_variable("generation", EntryKey::new("g1", 0), VarKind::Continuous, 0.0, 100.0, 20.0);
//! let g2 = model.add_variable("generation", EntryKey::new("g2", 0), VarKind::Continuous, 0.0, 100.0, 35.0);
//! model
//!     .add_constraint(
//!         "market_balance",
//!         EntryKey::new("north", 0),
//!         vec![Term::new(g1, 1.0), Term::new(g2, 1.0)],
//!         Sense::Eq,
//!         120.0,
//!     )
//!     .unwrap();
//! assert_eq!(model.num_variables(), 2);
//! ```

use crate::error::{HtsError, HtsResult};
use crate::table::{EntryKey, ValueTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Index of a variable inside its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub usize);

/// Index of a constraint inside its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(pub usize);

/// Domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    #[default]
    Continuous,
    Integer,
    /// Integer restricted to {0, 1} regardless of the stored bounds.
    Binary,
}

impl VarKind {
    pub fn is_integral(&self) -> bool {
        matches!(self, VarKind::Integer | VarKind::Binary)
    }
}

/// Constraint direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    #[serde(rename = "<=", alias = "le")]
    Le,
    #[serde(rename = ">=", alias = "ge")]
    Ge,
    #[serde(rename = "==", alias = "eq")]
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "==",
        })
    }
}

/// `coef * var`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub var: VarId,
    pub coef: f64,
}

impl Term {
    pub fn new(var: VarId, coef: f64) -> Self {
        Self { var, coef }
    }
}

mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_some(v)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
    }
}

mod upper_bound {
    use serde::{Deserialize, Deserializer};

    pub use super::lower_bound::serialize;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

fn unbounded_above() -> f64 {
    f64::INFINITY
}

/// A decision variable. Infinite bounds serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub group: String,
    #[serde(flatten)]
    pub key: EntryKey,
    #[serde(default)]
    pub kind: VarKind,
    #[serde(default, with = "lower_bound")]
    pub lower: f64,
    #[serde(default = "unbounded_above", with = "upper_bound")]
    pub upper: f64,
    /// Objective coefficient (minimisation).
    #[serde(default)]
    pub objective: f64,
    /// When set, overrides the bounds with `lower = upper = value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<f64>,
}

impl Variable {
    /// Display name, e.g. `generation[g1,3]`.
    pub fn name(&self) -> String {
        format!("{}[{}]", self.group, self.key)
    }
}

/// A linear constraint `Σ coef·var  sense  rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub group: String,
    #[serde(flatten)]
    pub key: EntryKey,
    pub terms: Vec<Term>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn name(&self) -> String {
        format!("{}[{}]", self.group, self.key)
    }
}

/// Raw termination of the most recent solve, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTermination {
    pub backend: String,
    pub raw_code: String,
    pub duals_valid: bool,
}

#[derive(Debug, Clone, Default)]
struct SolveState {
    termination: Option<LastTermination>,
    primal: Option<Vec<f64>>,
    duals: Option<Vec<f64>>,
}

/// A minimisation MILP with named variable and constraint groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default)]
    constraints: Vec<Constraint>,
    #[serde(default)]
    objective_offset: f64,
    #[serde(skip)]
    state: SolveState,
}

impl LinearModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Add a variable and return its id. Binary variables get `[0, 1]`
    /// intersected with the requested bounds.
    pub fn add_variable(
        &mut self,
        group: impl Into<String>,
        key: EntryKey,
        kind: VarKind,
        lower: f64,
        upper: f64,
        objective: f64,
    ) -> VarId {
        let (lower, upper) = match kind {
            VarKind::Binary => (lower.max(0.0), upper.min(1.0)),
            _ => (lower, upper),
        };
        self.push_variable(Variable {
            group: group.into(),
            key,
            kind,
            lower,
            upper,
            objective,
            fixed: None,
        })
    }

    /// Append a fully specified variable as-is.
    pub fn push_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        group: impl Into<String>,
        key: EntryKey,
        terms: Vec<Term>,
        sense: Sense,
        rhs: f64,
    ) -> HtsResult<ConstraintId> {
        self.push_constraint(Constraint {
            group: group.into(),
            key,
            terms,
            sense,
            rhs,
        })
    }

    /// Append a constraint, rejecting references to unknown variables.
    pub fn push_constraint(&mut self, constraint: Constraint) -> HtsResult<ConstraintId> {
        for term in &constraint.terms {
            self.check_var(term.var)?;
        }
        self.constraints.push(constraint);
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    pub fn set_objective_offset(&mut self, offset: f64) {
        self.objective_offset = offset;
    }

    pub fn objective_offset(&self) -> f64 {
        self.objective_offset
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn variable(&self, id: VarId) -> HtsResult<&Variable> {
        self.check_var(id)?;
        Ok(&self.variables[id.0])
    }

    pub fn constraint(&self, id: ConstraintId) -> HtsResult<&Constraint> {
        self.constraints.get(id.0).ok_or(HtsError::UnknownId {
            kind: "constraint",
            index: id.0,
            len: self.constraints.len(),
        })
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.variables.len()).map(VarId)
    }

    pub fn constraint_ids(&self) -> impl Iterator<Item = ConstraintId> {
        (0..self.constraints.len()).map(ConstraintId)
    }

    pub fn var_id(&self, group: &str, key: &EntryKey) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.group == group && &v.key == key)
            .map(VarId)
    }

    pub fn constraint_id(&self, group: &str, key: &EntryKey) -> Option<ConstraintId> {
        self.constraints
            .iter()
            .position(|c| c.group == group && &c.key == key)
            .map(ConstraintId)
    }

    pub fn variable_groups(&self) -> BTreeSet<&str> {
        self.variables.iter().map(|v| v.group.as_str()).collect()
    }

    pub fn constraint_groups(&self) -> BTreeSet<&str> {
        self.constraints.iter().map(|c| c.group.as_str()).collect()
    }

    /// Variables of one group with their ids.
    pub fn group_variables<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (VarId, &'a Variable)> + 'a {
        self.variables
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.group == group)
            .map(|(i, v)| (VarId(i), v))
    }

    /// Constraints of one group with their ids.
    pub fn group_constraints<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (ConstraintId, &'a Constraint)> + 'a {
        self.constraints
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.group == group)
            .map(|(i, c)| (ConstraintId(i), c))
    }

    /// Bounds a solver must honour: the fixed value if any, otherwise the
    /// stored bounds (clamped to `[0, 1]` for binaries).
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn effective_bounds(&self, id: VarId) -> (f64, f64) {
        let v = &self.variables[id.0];
        if let Some(value) = v.fixed {
            return (value, value);
        }
        match v.kind {
            VarKind::Binary => (v.lower.max(0.0), v.upper.min(1.0)),
            _ => (v.lower, v.upper),
        }
    }

    /// Integer or binary variables that are not currently fixed.
    pub fn free_integer_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind.is_integral() && v.fixed.is_none())
            .count()
    }

    pub fn has_integers(&self) -> bool {
        self.variables.iter().any(|v| v.kind.is_integral())
    }

    // ------------------------------------------------------------------
    // Fixing
    // ------------------------------------------------------------------

    /// Pin a variable to `value` until [`unfix`](Self::unfix) is called.
    pub fn fix(&mut self, id: VarId, value: f64) -> HtsResult<()> {
        self.check_var(id)?;
        if !value.is_finite() {
            return Err(HtsError::Validation(format!(
                "cannot fix {} to non-finite value {value}",
                self.variables[id.0].name()
            )));
        }
        self.variables[id.0].fixed = Some(value);
        Ok(())
    }

    pub fn unfix(&mut self, id: VarId) -> HtsResult<()> {
        self.check_var(id)?;
        self.variables[id.0].fixed = None;
        Ok(())
    }

    pub fn fixed_value(&self, id: VarId) -> HtsResult<Option<f64>> {
        Ok(self.variable(id)?.fixed)
    }

    /// Overwrite the fix state of a variable; ids out of range are ignored.
    pub fn restore_fix(&mut self, id: VarId, state: Option<f64>) {
        if let Some(v) = self.variables.get_mut(id.0) {
            v.fixed = state;
        }
    }

    /// Snapshot of every variable's fix state, in id order.
    pub fn fix_state(&self) -> Vec<Option<f64>> {
        self.variables.iter().map(|v| v.fixed).collect()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum::<f64>()
            + self.objective_offset
    }

    /// Left-hand side of a constraint at `values`; missing entries count as 0.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn activity(&self, id: ConstraintId, values: &[f64]) -> f64 {
        self.constraints[id.0]
            .terms
            .iter()
            .map(|t| t.coef * values.get(t.var.0).copied().unwrap_or(0.0))
            .sum()
    }

    /// Largest bound or constraint violation of `values` (0 when feasible).
    /// Integrality is not checked.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        if values.len() != self.variables.len() {
            return f64::INFINITY;
        }
        let mut worst: f64 = 0.0;
        for id in self.var_ids() {
            let (lo, hi) = self.effective_bounds(id);
            let x = values[id.0];
            if !x.is_finite() {
                return f64::INFINITY;
            }
            worst = worst.max(lo - x).max(x - hi);
        }
        for id in self.constraint_ids() {
            let c = &self.constraints[id.0];
            let lhs = self.activity(id, values);
            let gap = match c.sense {
                Sense::Le => lhs - c.rhs,
                Sense::Ge => c.rhs - lhs,
                Sense::Eq => (lhs - c.rhs).abs(),
            };
            worst = worst.max(gap);
        }
        worst
    }

    /// Literal rendering of a constraint, e.g. `generation[g1,0] + 2 generation[g2,0] >= 50`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn expression(&self, id: ConstraintId) -> String {
        let c = &self.constraints[id.0];
        let mut lhs = String::new();
        for (i, term) in c.terms.iter().enumerate() {
            let name = self
                .variables
                .get(term.var.0)
                .map(Variable::name)
                .unwrap_or_else(|| format!("x{}", term.var.0));
            let magnitude = term.coef.abs();
            let sign = if term.coef < 0.0 { "-" } else { "+" };
            match (i, magnitude == 1.0) {
                (0, true) if term.coef < 0.0 => lhs.push_str(&format!("-{name}")),
                (0, true) => lhs.push_str(&name),
                (0, false) => lhs.push_str(&format!("{} {name}", term.coef)),
                (_, true) => lhs.push_str(&format!(" {sign} {name}")),
                (_, false) => lhs.push_str(&format!(" {sign} {magnitude} {name}")),
            }
        }
        if lhs.is_empty() {
            lhs.push('0');
        }
        format!("{lhs} {} {}", c.sense, c.rhs)
    }

    // ------------------------------------------------------------------
    // Solve state
    // ------------------------------------------------------------------

    pub fn record_termination(&mut self, termination: LastTermination) {
        self.state.termination = Some(termination);
    }

    pub fn last_termination(&self) -> Option<&LastTermination> {
        self.state.termination.as_ref()
    }

    pub fn duals_valid(&self) -> bool {
        self.state
            .termination
            .as_ref()
            .map(|t| t.duals_valid)
            .unwrap_or(false)
    }

    /// Store the vectors produced by the last solve (either may be absent).
    pub fn record_solution(&mut self, primal: Option<Vec<f64>>, duals: Option<Vec<f64>>) {
        self.state.primal = primal;
        self.state.duals = duals;
    }

    pub fn value(&self, id: VarId) -> Option<f64> {
        self.state.primal.as_ref()?.get(id.0).copied()
    }

    pub fn dual(&self, id: ConstraintId) -> Option<f64> {
        if !self.duals_valid() {
            return None;
        }
        self.state.duals.as_ref()?.get(id.0).copied()
    }

    /// Group the given per-variable vector into one table per variable group.
    pub fn variable_tables(&self, values: &[f64]) -> BTreeMap<String, ValueTable> {
        let mut out: BTreeMap<String, ValueTable> = BTreeMap::new();
        for (v, x) in self.variables.iter().zip(values) {
            out.entry(v.group.clone())
                .or_default()
                .insert(v.key.clone(), *x);
        }
        out
    }

    /// Group the given per-constraint vector into one table per constraint group.
    pub fn constraint_tables(&self, values: &[f64]) -> BTreeMap<String, ValueTable> {
        let mut out: BTreeMap<String, ValueTable> = BTreeMap::new();
        for (c, y) in self.constraints.iter().zip(values) {
            out.entry(c.group.clone())
                .or_default()
                .insert(c.key.clone(), *y);
        }
        out
    }

    // ------------------------------------------------------------------
    // Validation and I/O
    // ------------------------------------------------------------------

    /// Structural checks: finite coefficients, consistent bounds, unique
    /// keys within each group, no dangling variable references.
    pub fn validate(&self) -> HtsResult<()> {
        let mut seen = HashSet::new();
        for v in &self.variables {
            let name = v.name();
            if v.group.is_empty() {
                return Err(HtsError::Validation(format!(
                    "variable {name} has an empty group"
                )));
            }
            if !seen.insert((v.group.as_str(), &v.key)) {
                return Err(HtsError::Validation(format!("duplicate variable {name}")));
            }
            if v.lower.is_nan() || v.upper.is_nan() || v.lower > v.upper {
                return Err(HtsError::Validation(format!(
                    "variable {name} has invalid bounds [{}, {}]",
                    v.lower, v.upper
                )));
            }
            if v.lower == f64::INFINITY || v.upper == f64::NEG_INFINITY {
                return Err(HtsError::Validation(format!(
                    "variable {name} has an empty domain"
                )));
            }
            if !v.objective.is_finite() {
                return Err(HtsError::Validation(format!(
                    "variable {name} has non-finite objective coefficient"
                )));
            }
            if matches!(v.fixed, Some(x) if !x.is_finite()) {
                return Err(HtsError::Validation(format!(
                    "variable {name} is fixed to a non-finite value"
                )));
            }
        }

        let mut seen = HashSet::new();
        for c in &self.constraints {
            let name = c.name();
            if !seen.insert((c.group.as_str(), &c.key)) {
                return Err(HtsError::Validation(format!(
                    "duplicate constraint {name}"
                )));
            }
            if !c.rhs.is_finite() {
                return Err(HtsError::Validation(format!(
                    "constraint {name} has non-finite right-hand side"
                )));
            }
            for t in &c.terms {
                self.check_var(t.var).map_err(|_| {
                    HtsError::Validation(format!(
                        "constraint {name} references unknown variable {}",
                        t.var.0
                    ))
                })?;
                if !t.coef.is_finite() {
                    return Err(HtsError::Validation(format!(
                        "constraint {name} has non-finite coefficient"
                    )));
                }
            }
        }
        if !self.objective_offset.is_finite() {
            return Err(HtsError::Validation("non-finite objective offset".into()));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> HtsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a model from a JSON document.
    pub fn load(path: impl AsRef<Path>) -> HtsResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> HtsResult<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn check_var(&self, id: VarId) -> HtsResult<()> {
        if id.0 < self.variables.len() {
            Ok(())
        } else {
            Err(HtsError::UnknownId {
                kind: "variable",
                index: id.0,
                len: self.variables.len(),
            })
        }
    }
}
