//! Builtin backend: Clarabel relaxations under depth-first branch-and-bound.
//!
//! Continuous models (including a commitment model whose integers are all
//! fixed) are a single LP and report constraint duals. Models with free
//! integer variables go through [`BranchAndBound`]:
//!
//! 1. solve the root relaxation to completion;
//! 2. seed an incumbent from the warm start and from rounding the root
//!    solution (commit-up rounding first, then nearest);
//! 3. explore nodes depth-first, up-branch first, pruning on the incumbent
//!    with the relative gap tolerance;
//! 4. check the deadline and node budget between nodes.
//!
//! The root relaxation and the heuristics up to the first incumbent ignore
//! the deadline, so a commitment problem whose rounded-up relaxation is
//! feasible has an incumbent even under a tiny time limit. Heuristics after
//! the first incumbent are capped at the remaining budget and skipped once
//! it is spent.

use super::lp::{solve_lp, LpSettings, LpSolution, LpStatus};
use super::{reject_unknown_options, RawOutcome, SolveRequest, SolverBackend};
use hts_core::LinearModel;
use hts_solver_common::{BackendId, OptionValue, SolverResult};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

const NATIVE_CODES: &[&str] = &[
    "optimal",
    "time_limit",
    "node_limit",
    "iteration_limit",
    "infeasible",
    "unbounded",
    "numerical_error",
    "not_solved",
];

const OPTIONS: &[(&str, &str)] = &[
    ("max_nodes", "integer"),
    ("max_iter", "integer"),
    ("integrality_tolerance", "float"),
    ("feasibility_tolerance", "float"),
];

/// Accepted violation for an LP iterate returned at a time/iteration limit.
const LIMIT_ACCEPT_TOL: f64 = 1e-6;

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinBackend;

impl BuiltinBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for BuiltinBackend {
    fn id(&self) -> BackendId {
        BackendId::Builtin
    }

    fn native_codes(&self) -> &'static [&'static str] {
        NATIVE_CODES
    }

    fn supports_duals(&self) -> bool {
        true
    }

    fn supports_conflict(&self) -> bool {
        true
    }

    fn supports_warm_start(&self) -> bool {
        true
    }

    fn check_options(&self, options: &BTreeMap<String, OptionValue>) -> SolverResult<()> {
        reject_unknown_options(BackendId::Builtin, options, OPTIONS)
    }

    /// The time limit can be overrun by the root relaxation plus the
    /// heuristic LPs needed to find a first incumbent.
    fn solve(&self, model: &LinearModel, request: &SolveRequest<'_>) -> SolverResult<RawOutcome> {
        self.check_options(request.options)?;
        let settings = BnbSettings::from_request(request);

        let mut base: Vec<(f64, f64)> = model.var_ids().map(|id| model.effective_bounds(id)).collect();
        let mut integers = Vec::new();
        for (j, v) in model.variables().iter().enumerate() {
            if !v.kind.is_integral() {
                continue;
            }
            let (lo, hi) = base[j];
            let rounded = (
                (lo - settings.int_tol).ceil(),
                (hi + settings.int_tol).floor(),
            );
            base[j] = rounded;
            if rounded.0 < rounded.1 {
                integers.push(j);
            }
        }
        if base.iter().any(|(lo, hi)| lo > hi) {
            return Ok(RawOutcome::with_code("infeasible"));
        }

        if integers.is_empty() {
            return Ok(solve_continuous(model, &base, &settings, request));
        }
        Ok(BranchAndBound::new(model, base, integers, settings).run(request.initial))
    }
}

#[derive(Debug, Clone)]
struct BnbSettings {
    max_nodes: u64,
    int_tol: f64,
    mip_gap: f64,
    deadline: Instant,
    verbosity: u8,
    lp: LpSettings,
}

impl BnbSettings {
    fn from_request(request: &SolveRequest<'_>) -> Self {
        let opt = |name: &str| request.options.get(name);
        let mut lp = LpSettings {
            verbose: request.verbosity >= 2,
            ..LpSettings::default()
        };
        if let Some(it) = opt("max_iter").and_then(OptionValue::as_u64) {
            lp.max_iter = u32::try_from(it).unwrap_or(u32::MAX);
        }
        if let Some(tol) = opt("feasibility_tolerance").and_then(OptionValue::as_f64) {
            lp.tol_feas = tol;
        }
        Self {
            max_nodes: opt("max_nodes").and_then(OptionValue::as_u64).unwrap_or(100_000),
            int_tol: opt("integrality_tolerance")
                .and_then(OptionValue::as_f64)
                .unwrap_or(1e-6),
            mip_gap: request.mip_gap,
            deadline: request.deadline,
            verbosity: request.verbosity,
            lp,
        }
    }

    /// LP settings for a node, capped by the time left.
    fn node_lp(&self) -> LpSettings {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        LpSettings {
            time_limit: Some(remaining.as_secs_f64()),
            verbose: false,
            ..self.lp.clone()
        }
    }

    /// LP settings for the root phase, which is never interrupted.
    fn root_lp(&self) -> LpSettings {
        LpSettings {
            verbose: false,
            ..self.lp.clone()
        }
    }
}

fn solve_continuous(
    model: &LinearModel,
    bounds: &[(f64, f64)],
    settings: &BnbSettings,
    request: &SolveRequest<'_>,
) -> RawOutcome {
    let lp_settings = LpSettings {
        time_limit: Some(request.remaining().as_secs_f64()),
        ..settings.lp.clone()
    };
    let lp = solve_lp(model, bounds, &lp_settings);
    let code = match lp.status {
        LpStatus::Optimal => "optimal",
        LpStatus::Infeasible => "infeasible",
        LpStatus::Unbounded => "unbounded",
        LpStatus::TimeLimit => "time_limit",
        LpStatus::IterationLimit => "iteration_limit",
        LpStatus::Numerical => "numerical_error",
    };
    let mut outcome = RawOutcome::with_code(code);
    outcome.nodes = Some(1);
    match lp.status {
        LpStatus::Optimal => {
            outcome.objective = Some(lp.objective);
            outcome.primal = Some(lp.x);
            outcome.duals = Some(lp.duals);
            outcome.mip_gap = Some(0.0);
        }
        LpStatus::TimeLimit | LpStatus::IterationLimit
            if model.max_violation(&lp.x) <= LIMIT_ACCEPT_TOL =>
        {
            outcome.objective = Some(lp.objective);
            outcome.primal = Some(lp.x);
        }
        _ => {}
    }
    outcome
}

#[derive(Debug, Clone)]
struct Incumbent {
    x: Vec<f64>,
    objective: f64,
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Vec<(f64, f64)>,
    /// Objective of the parent relaxation: a lower bound for this subtree.
    parent_bound: f64,
    depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Exhausted,
    TimeLimit,
    NodeLimit,
}

struct BranchAndBound<'m> {
    model: &'m LinearModel,
    base: Vec<(f64, f64)>,
    integers: Vec<usize>,
    settings: BnbSettings,
    incumbent: Option<Incumbent>,
    nodes: u64,
    /// Lowest bound among subtrees discarded by the gap tolerance or abandoned.
    bound_floor: f64,
    abandoned: bool,
}

impl<'m> BranchAndBound<'m> {
    fn new(
        model: &'m LinearModel,
        base: Vec<(f64, f64)>,
        integers: Vec<usize>,
        settings: BnbSettings,
    ) -> Self {
        Self {
            model,
            base,
            integers,
            settings,
            incumbent: None,
            nodes: 0,
            bound_floor: f64::INFINITY,
            abandoned: false,
        }
    }

    fn run(mut self, initial: Option<&[Option<f64>]>) -> RawOutcome {
        let root = solve_lp(self.model, &self.base, &self.settings.root_lp());
        self.nodes = 1;
        match root.status {
            LpStatus::Optimal => {}
            LpStatus::Infeasible => return self.outcome("infeasible", &[]),
            LpStatus::Unbounded => return self.outcome("unbounded", &[]),
            LpStatus::TimeLimit | LpStatus::IterationLimit => {
                return self.outcome("iteration_limit", &[])
            }
            LpStatus::Numerical => return self.outcome("numerical_error", &[]),
        }
        debug!(
            objective = root.objective,
            integers = self.integers.len(),
            "root relaxation solved"
        );

        if let Some(initial) = initial {
            self.try_warm_start(initial);
        }
        if self.is_integral(&root.x) {
            self.accept(root.x);
            return self.outcome("optimal", &[]);
        }
        self.round_root(&root);

        let mut stack = Vec::new();
        let base = self.base.clone();
        self.branch(&base, &root, 0, &mut stack);

        let stop = loop {
            let Some(node) = stack.pop() else {
                break Stop::Exhausted;
            };
            if self.prune(node.parent_bound) {
                continue;
            }
            if Instant::now() >= self.settings.deadline {
                stack.push(node);
                break Stop::TimeLimit;
            }
            if self.nodes >= self.settings.max_nodes {
                stack.push(node);
                break Stop::NodeLimit;
            }

            let lp = solve_lp(self.model, &node.bounds, &self.settings.node_lp());
            self.nodes += 1;
            if self.settings.verbosity >= 2 && self.nodes % 100 == 0 {
                info!(
                    nodes = self.nodes,
                    open = stack.len(),
                    incumbent = self.incumbent.as_ref().map(|i| i.objective),
                    "branch-and-bound progress"
                );
            }
            match lp.status {
                LpStatus::Infeasible => continue,
                LpStatus::TimeLimit => {
                    stack.push(node);
                    break Stop::TimeLimit;
                }
                LpStatus::Unbounded | LpStatus::IterationLimit | LpStatus::Numerical => {
                    debug!(depth = node.depth, status = ?lp.status, "abandoning node");
                    self.abandoned = true;
                    self.bound_floor = self.bound_floor.min(node.parent_bound);
                    continue;
                }
                LpStatus::Optimal => {}
            }
            if self.prune(lp.objective) {
                continue;
            }
            if self.is_integral(&lp.x) {
                self.accept(lp.x);
                continue;
            }
            self.branch(&node.bounds, &lp, node.depth + 1, &mut stack);
        };

        let open: Vec<f64> = stack.iter().map(|n| n.parent_bound).collect();
        let code = match (stop, self.incumbent.is_some(), self.abandoned) {
            (Stop::TimeLimit, _, _) => "time_limit",
            (Stop::NodeLimit, _, _) => "node_limit",
            (Stop::Exhausted, true, false) => "optimal",
            (Stop::Exhausted, false, false) => "infeasible",
            (Stop::Exhausted, true, true) => "iteration_limit",
            (Stop::Exhausted, false, true) => "numerical_error",
        };
        self.outcome(code, &open)
    }

    fn is_integral(&self, x: &[f64]) -> bool {
        self.integers
            .iter()
            .all(|&j| (x[j] - x[j].round()).abs() <= self.settings.int_tol)
    }

    /// True when the subtree bounded below by `bound` cannot improve the
    /// incumbent by more than the gap tolerance.
    fn prune(&mut self, bound: f64) -> bool {
        let Some(inc) = &self.incumbent else {
            return false;
        };
        let scale = inc.objective.abs().max(1.0);
        if bound >= inc.objective - 1e-9 * scale {
            return true;
        }
        if bound >= inc.objective - self.settings.mip_gap * inc.objective.abs() {
            self.bound_floor = self.bound_floor.min(bound);
            return true;
        }
        false
    }

    /// Push the two children of a fractional node, down-branch first so
    /// that the up-branch is explored next.
    fn branch(&self, bounds: &[(f64, f64)], lp: &LpSolution, depth: usize, stack: &mut Vec<Node>) {
        let Some(j) = self.most_fractional(&lp.x) else {
            return;
        };
        let value = lp.x[j];
        let mut down = bounds.to_vec();
        down[j].1 = value.floor();
        let mut up = bounds.to_vec();
        up[j].0 = value.ceil();
        for child in [down, up] {
            stack.push(Node {
                bounds: child,
                parent_bound: lp.objective,
                depth,
            });
        }
    }

    fn most_fractional(&self, x: &[f64]) -> Option<usize> {
        self.integers
            .iter()
            .copied()
            .filter(|&j| (x[j] - x[j].round()).abs() > self.settings.int_tol)
            .min_by(|&a, &b| {
                let fa = ((x[a] - x[a].floor()) - 0.5).abs();
                let fb = ((x[b] - x[b].floor()) - 0.5).abs();
                fa.total_cmp(&fb)
            })
    }

    /// Fix every integer to `values[j]` and solve the remaining LP.
    ///
    /// Runs to completion while there is no incumbent; afterwards the LP is
    /// capped at the time left and skipped past the deadline.
    fn complete_assignment(&mut self, values: impl Fn(usize) -> f64, label: &str) -> bool {
        let lp_settings = if self.incumbent.is_none() {
            self.settings.root_lp()
        } else if Instant::now() < self.settings.deadline {
            self.settings.node_lp()
        } else {
            debug!(heuristic = label, "deadline reached, skipping heuristic");
            return false;
        };
        let mut bounds = self.base.clone();
        for &j in &self.integers {
            let (lo, hi) = self.base[j];
            let v = values(j).round().clamp(lo, hi);
            bounds[j] = (v, v);
        }
        let lp = solve_lp(self.model, &bounds, &lp_settings);
        self.nodes += 1;
        if lp.status == LpStatus::Optimal {
            debug!(heuristic = label, objective = lp.objective, "incumbent candidate");
            self.accept(lp.x);
            true
        } else {
            false
        }
    }

    fn try_warm_start(&mut self, initial: &[Option<f64>]) {
        let complete = self
            .integers
            .iter()
            .all(|&j| matches!(initial.get(j), Some(Some(v)) if v.is_finite()));
        if !complete {
            debug!("warm start does not cover every integer variable, ignoring it");
            return;
        }
        let values: Vec<f64> = initial.iter().map(|v| v.unwrap_or(0.0)).collect();
        if !self.complete_assignment(|j| values[j], "warm_start") {
            debug!("warm start assignment is infeasible");
        }
    }

    fn round_root(&mut self, root: &LpSolution) {
        let tol = self.settings.int_tol;
        let x = root.x.clone();
        self.complete_assignment(|j| (x[j] - tol).ceil(), "round_up");
        self.complete_assignment(|j| x[j].round(), "round_nearest");
    }

    fn accept(&mut self, mut x: Vec<f64>) {
        for &j in &self.integers {
            x[j] = x[j].round();
        }
        let objective = self.model.objective_value(&x);
        let better = self
            .incumbent
            .as_ref()
            .map_or(true, |inc| objective < inc.objective);
        if better {
            debug!(objective, nodes = self.nodes, "new incumbent");
            self.incumbent = Some(Incumbent { x, objective });
        }
    }

    fn outcome(self, code: &str, open_bounds: &[f64]) -> RawOutcome {
        let mut outcome = RawOutcome::with_code(code);
        outcome.nodes = Some(self.nodes);
        if let Some(inc) = self.incumbent {
            let best_bound = open_bounds
                .iter()
                .copied()
                .fold(self.bound_floor, f64::min)
                .min(inc.objective);
            let gap = (inc.objective - best_bound) / inc.objective.abs().max(1e-10);
            outcome.mip_gap = Some(gap.max(0.0));
            outcome.objective = Some(inc.objective);
            outcome.primal = Some(inc.x);
        }
        if self.settings.verbosity >= 1 {
            info!(
                code,
                nodes = outcome.nodes,
                objective = outcome.objective,
                gap = outcome.mip_gap,
                "branch-and-bound finished"
            );
        }
        outcome
    }
}
