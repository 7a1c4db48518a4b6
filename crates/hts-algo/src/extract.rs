//! Read-only views over a [`SolveResult`]: prices, cost breakdown, series.
//!
//! Missing data never turns into made-up numbers. A result without duals
//! yields an empty price table, a result without values yields an all-zero
//! cost breakdown, and only [`series`] substitutes `0.0` for a missing
//! entry (with a warning) so callers get a dense vector.

use hts_core::{EntryKey, LinearModel, ValueTable};
use hts_solver_common::{SolveResult, SolveStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::ops::{Range, RangeInclusive};
use std::path::Path;
use tracing::warn;

pub const PRICE_COLUMNS: [&str; 3] = ["zone", "period", "price"];

/// Marginal price of one zone in one period. `None` means unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub zone: String,
    pub period: usize,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub rows: Vec<PriceRow>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One row per key, every price unavailable.
    pub fn unavailable<'a>(keys: impl IntoIterator<Item = &'a EntryKey>) -> Self {
        Self {
            rows: keys
                .into_iter()
                .map(|k| PriceRow {
                    zone: k.entity.clone(),
                    period: k.period,
                    price: None,
                })
                .collect(),
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &PRICE_COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, zone: &str, period: usize) -> Option<&PriceRow> {
        self.rows
            .iter()
            .find(|r| r.zone == zone && r.period == period)
    }

    /// True when at least one row carries a price.
    pub fn has_prices(&self) -> bool {
        self.rows.iter().any(|r| r.price.is_some())
    }

    /// Write `zone,period,price`. The header is written even for an empty
    /// table; an unavailable price is an empty field.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path.as_ref())?;
        writer.write_record(PRICE_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()
    }
}

/// Restricts a price table to some zones and periods.
#[derive(Debug, Clone, Default)]
pub struct PriceFilter {
    pub zones: Option<BTreeSet<String>>,
    pub periods: Option<RangeInclusive<usize>>,
}

impl PriceFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = Some(zones.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_periods(mut self, periods: RangeInclusive<usize>) -> Self {
        self.periods = Some(periods);
        self
    }

    pub fn accepts(&self, key: &EntryKey) -> bool {
        self.zones.as_ref().map_or(true, |z| z.contains(&key.entity))
            && self.periods.as_ref().map_or(true, |p| p.contains(&key.period))
    }
}

/// Prices from the duals of `group` in a pricing result.
///
/// Returns an empty table when the result is not `Optimal` or carries no
/// duals for the group.
pub fn price_table(result: &SolveResult, group: &str, filter: &PriceFilter) -> PriceTable {
    if result.status != SolveStatus::Optimal {
        warn!(status = %result.status, group, "no prices: pricing solve is not optimal");
        return PriceTable::empty();
    }
    let Some(duals) = result.duals.get(group).filter(|t| !t.is_empty()) else {
        warn!(group, "no prices: result has no duals for the balance group");
        return PriceTable::empty();
    };
    PriceTable {
        rows: duals
            .iter()
            .filter(|(key, _)| filter.accepts(key))
            .map(|(key, price)| PriceRow {
                zone: key.entity.clone(),
                period: key.period,
                price: Some(price),
            })
            .collect(),
    }
}

/// Unit costs applied to one variable group under one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTerm {
    pub category: String,
    pub variable_group: String,
    #[serde(default)]
    pub default_unit_cost: f64,
    /// Per-entity override of the default.
    #[serde(default)]
    pub entity_costs: BTreeMap<String, f64>,
    /// Per-(entity, period) override, highest precedence.
    #[serde(default)]
    pub entry_costs: ValueTable,
}

impl CostTerm {
    pub fn new(category: impl Into<String>, variable_group: impl Into<String>, unit_cost: f64) -> Self {
        Self {
            category: category.into(),
            variable_group: variable_group.into(),
            default_unit_cost: unit_cost,
            ..Self::default()
        }
    }

    pub fn with_entity_cost(mut self, entity: impl Into<String>, cost: f64) -> Self {
        self.entity_costs.insert(entity.into(), cost);
        self
    }

    pub fn unit_cost(&self, key: &EntryKey) -> f64 {
        self.entry_costs
            .get(key)
            .or_else(|| self.entity_costs.get(&key.entity).copied())
            .unwrap_or(self.default_unit_cost)
    }
}

/// Static parameters for [`cost_breakdown`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    pub terms: Vec<CostTerm>,
}

impl CostParameters {
    pub fn new(terms: Vec<CostTerm>) -> Self {
        Self { terms }
    }

    /// Unit costs read from the model's objective coefficients.
    ///
    /// `categories` maps a category name to the variable groups it covers.
    /// Groups with objective coefficients that no category names are
    /// collected under `other`; with no categories at all, every such group
    /// becomes its own category. The resulting total equals the objective
    /// minus its constant offset.
    pub fn from_objective(model: &LinearModel, categories: &BTreeMap<String, Vec<String>>) -> Self {
        let mut per_group: BTreeMap<&str, ValueTable> = BTreeMap::new();
        for v in model.variables().iter().filter(|v| v.objective != 0.0) {
            per_group
                .entry(v.group.as_str())
                .or_default()
                .insert(v.key.clone(), v.objective);
        }

        let mut terms = Vec::new();
        let mut covered = BTreeSet::new();
        for (category, groups) in categories {
            for group in groups {
                covered.insert(group.as_str());
                terms.push(CostTerm {
                    category: category.clone(),
                    variable_group: group.clone(),
                    entry_costs: per_group.get(group.as_str()).cloned().unwrap_or_default(),
                    ..CostTerm::default()
                });
            }
        }
        for (group, costs) in &per_group {
            if covered.contains(group) {
                continue;
            }
            let category = if categories.is_empty() {
                (*group).to_string()
            } else {
                "other".to_string()
            };
            terms.push(CostTerm {
                category,
                variable_group: (*group).to_string(),
                entry_costs: costs.clone(),
                ..CostTerm::default()
            });
        }
        Self { terms }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostComponent {
    pub name: String,
    pub value: f64,
}

/// Named cost components and their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub components: Vec<CostComponent>,
    pub total: f64,
}

impl CostBreakdown {
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.iter().find(|c| c.name == name).map(|c| c.value)
    }

    fn push(&mut self, name: &str, value: f64) {
        match self.components.iter_mut().find(|c| c.name == name) {
            Some(c) => c.value += value,
            None => self.components.push(CostComponent {
                name: name.to_string(),
                value,
            }),
        }
    }
}

/// Sum `value * unit_cost` per category, in the order categories first
/// appear in `params`.
pub fn cost_breakdown(result: &SolveResult, params: &CostParameters) -> CostBreakdown {
    let has_values = result.has_values();
    if !has_values {
        warn!(status = %result.status, "no values in result, cost breakdown is zero");
    }
    let mut breakdown = CostBreakdown::default();
    for term in &params.terms {
        let value = match result.values.get(&term.variable_group) {
            Some(table) if has_values => table
                .iter()
                .map(|(key, x)| x * term.unit_cost(key))
                .sum(),
            _ => 0.0,
        };
        breakdown.push(&term.category, value);
    }
    breakdown.total = breakdown.components.iter().map(|c| c.value).sum();
    breakdown
}

/// Values of one entity over `periods`, dense. Missing entries are `0.0`.
pub fn series(result: &SolveResult, group: &str, entity: &str, periods: Range<usize>) -> Vec<f64> {
    let table = result.values.get(group);
    let mut missing = 0usize;
    let out: Vec<f64> = periods
        .clone()
        .map(|t| {
            table.and_then(|tb| tb.get_at(entity, t)).unwrap_or_else(|| {
                missing += 1;
                0.0
            })
        })
        .collect();
    if missing > 0 {
        warn!(
            group,
            entity,
            missing,
            periods = ?periods,
            "series has missing entries, filled with 0.0"
        );
    }
    out
}
