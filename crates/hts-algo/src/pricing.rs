//! Two-stage "commit then price" workflow.
//!
//! Stage 1 solves the mixed-integer model as given. Stage 2 pins every
//! integer and binary variable to its rounded stage-1 value and re-solves
//! the remaining LP, whose balance-constraint duals are the marginal prices.
//! The pins live in a [`FixGuard`], so the caller's fix state is restored
//! however stage 2 ends.

use crate::backend::SolverBackend;
use crate::executor::{execute, fmt_opt};
use crate::extract::{price_table, CostBreakdown, PriceFilter, PriceTable};
use crate::log::SolveLog;
use hts_core::{EntryKey, LinearModel, VarId};
use hts_solver_common::{SolveOptions, SolveResult, SolverResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPhase {
    NotStarted,
    Stage1Solving,
    Stage1Done,
    Stage2Solving,
    Stage2Done,
    Skipped,
    Finished,
}

impl PricingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingPhase::NotStarted => "not_started",
            PricingPhase::Stage1Solving => "stage1_solving",
            PricingPhase::Stage1Done => "stage1_done",
            PricingPhase::Stage2Solving => "stage2_solving",
            PricingPhase::Stage2Done => "stage2_done",
            PricingPhase::Skipped => "skipped",
            PricingPhase::Finished => "finished",
        }
    }
}

/// Temporarily fixed variables of a borrowed model.
///
/// Every [`fix`](Self::fix) remembers the variable's previous fix state the
/// first time it is touched; dropping the guard writes those states back in
/// reverse order. Drop also runs during unwinding.
pub struct FixGuard<'m> {
    model: &'m mut LinearModel,
    saved: Vec<(VarId, Option<f64>)>,
    seen: HashSet<VarId>,
}

impl<'m> FixGuard<'m> {
    pub fn new(model: &'m mut LinearModel) -> Self {
        Self {
            model,
            saved: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn fix(&mut self, id: VarId, value: f64) -> SolverResult<()> {
        let prior = self.model.fixed_value(id)?;
        self.model.fix(id, value)?;
        if self.seen.insert(id) {
            self.saved.push((id, prior));
        }
        Ok(())
    }

    pub fn model(&mut self) -> &mut LinearModel {
        self.model
    }

    /// Number of distinct variables pinned through this guard.
    pub fn pinned(&self) -> usize {
        self.saved.len()
    }
}

impl Drop for FixGuard<'_> {
    fn drop(&mut self) {
        for (id, prior) in self.saved.drain(..).rev() {
            self.model.restore_fix(id, prior);
        }
        self.seen.clear();
    }
}

/// Both solves of a pricing run, plus what was derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoStageResult {
    pub commitment: SolveResult,
    pub pricing: Option<SolveResult>,
    pub prices: PriceTable,
    #[serde(default)]
    pub costs: CostBreakdown,
    pub phases: Vec<PricingPhase>,
    pub log_file: Option<PathBuf>,
}

impl TwoStageResult {
    pub fn final_phase(&self) -> Option<PricingPhase> {
        self.phases.last().copied()
    }
}

/// Drives the two solves for one backend.
pub struct PricingCoordinator<'a> {
    backend: &'a dyn SolverBackend,
    options: &'a SolveOptions,
    phases: Vec<PricingPhase>,
}

impl<'a> PricingCoordinator<'a> {
    pub fn new(backend: &'a dyn SolverBackend, options: &'a SolveOptions) -> Self {
        Self {
            backend,
            options,
            phases: vec![PricingPhase::NotStarted],
        }
    }

    fn enter(&mut self, phase: PricingPhase, log: &mut SolveLog) {
        debug!(phase = phase.as_str(), "pricing phase");
        log.event("stage", &[("phase", phase.as_str().to_string())]);
        self.phases.push(phase);
    }

    /// Run stage 1 and, if requested and possible, stage 2.
    ///
    /// The cost breakdown is left empty; the orchestrator fills it in.
    pub fn run(mut self, model: &mut LinearModel, log: &mut SolveLog) -> SolverResult<TwoStageResult> {
        let options = self.options;
        let warm_start = options.warm_start.as_ref();

        self.enter(PricingPhase::Stage1Solving, log);
        let commitment = execute(model, self.backend, options, warm_start, log)?;
        self.enter(PricingPhase::Stage1Done, log);

        let balance_keys: Vec<EntryKey> = model
            .group_constraints(&self.options.balance_group)
            .map(|(_, c)| c.key.clone())
            .collect();

        if !commitment.status.has_solution() {
            info!(status = %commitment.status, "commitment solve has no solution, skipping pricing");
            return Ok(self.finish(commitment, None, PriceTable::empty(), log));
        }
        if !self.options.pricing {
            self.enter(PricingPhase::Skipped, log);
            return Ok(self.finish(commitment, None, PriceTable::empty(), log));
        }

        let pricing = {
            let mut guard = FixGuard::new(model);
            let integers: Vec<(VarId, f64)> = guard
                .model()
                .variables()
                .iter()
                .enumerate()
                .filter(|(_, v)| v.kind.is_integral())
                .map(|(i, v)| {
                    let value = commitment.value(&v.group, &v.key.entity, v.key.period);
                    (VarId(i), value.unwrap_or(0.0).round())
                })
                .collect();
            for (id, value) in &integers {
                guard.fix(*id, *value)?;
            }
            debug_assert_eq!(guard.model().free_integer_count(), 0);
            log.event("fix", &[("pinned", guard.pinned().to_string())]);

            self.enter(PricingPhase::Stage2Solving, log);
            let pricing = execute(guard.model(), self.backend, self.options, None, log)?;
            self.enter(PricingPhase::Stage2Done, log);
            pricing
        };

        let prices = if pricing.status.has_solution() && pricing.has_duals() {
            price_table(&pricing, &self.options.balance_group, &PriceFilter::all())
        } else {
            warn!(
                status = %pricing.status,
                group = %self.options.balance_group,
                "pricing solve produced no duals, prices unavailable"
            );
            PriceTable::unavailable(&balance_keys)
        };
        if let (Some(s1), Some(s2)) = (commitment.objective, pricing.objective) {
            if s2 < s1 - 1e-6 * s1.abs().max(1.0) {
                warn!(stage1 = s1, stage2 = s2, "pricing objective below commitment objective");
            }
        }
        Ok(self.finish(commitment, Some(pricing), prices, log))
    }

    fn finish(
        mut self,
        commitment: SolveResult,
        pricing: Option<SolveResult>,
        prices: PriceTable,
        log: &mut SolveLog,
    ) -> TwoStageResult {
        self.enter(PricingPhase::Finished, log);
        log.event(
            "finished",
            &[
                ("commitment", commitment.status.to_string()),
                ("objective", fmt_opt(commitment.objective)),
                (
                    "pricing",
                    pricing
                        .as_ref()
                        .map_or_else(|| "none".to_string(), |p| p.status.to_string()),
                ),
                ("prices", prices.len().to_string()),
            ],
        );
        TwoStageResult {
            commitment,
            pricing,
            prices,
            costs: CostBreakdown::default(),
            phases: self.phases,
            log_file: Some(log.path().to_path_buf()),
        }
    }
}
