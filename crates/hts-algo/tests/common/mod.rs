//! Shared fixtures: small hydrothermal commitment models.

#![allow(dead_code)]

use hts_core::{EntryKey, LinearModel, Sense, Term, VarId, VarKind};
use hts_solver_common::SolveOptions;
use std::path::Path;

pub const DEMAND: [f64; 3] = [150.0, 260.0, 320.0];

struct Thermal {
    name: &'static str,
    pmin: f64,
    pmax: f64,
    marginal: f64,
    no_load: f64,
    startup: f64,
    initially_on: bool,
}

const THERMALS: [Thermal; 2] = [
    Thermal {
        name: "coal",
        pmin: 50.0,
        pmax: 200.0,
        marginal: 20.0,
        no_load: 300.0,
        startup: 1000.0,
        initially_on: true,
    },
    Thermal {
        name: "gas",
        pmin: 10.0,
        pmax: 100.0,
        marginal: 45.0,
        no_load: 50.0,
        startup: 100.0,
        initially_on: false,
    },
];

/// Two thermal units, one reservoir, one zone, three periods.
pub fn hydrothermal() -> LinearModel {
    let mut m = LinearModel::new("hydrothermal-3h");
    let periods = DEMAND.len();
    let mut supply: Vec<Vec<Term>> = vec![Vec::new(); periods];

    for unit in &THERMALS {
        let mut prev_on: Option<VarId> = None;
        for t in 0..periods {
            let key = EntryKey::new(unit.name, t);
            let on = m.add_variable("commitment", key.clone(), VarKind::Binary, 0.0, 1.0, unit.no_load);
            let start = m.add_variable("startup", key.clone(), VarKind::Binary, 0.0, 1.0, unit.startup);
            let gen = m.add_variable("generation", key.clone(), VarKind::Continuous, 0.0, unit.pmax, unit.marginal);
            m.add_constraint("capacity_max", key.clone(), vec![Term::new(gen, 1.0), Term::new(on, -unit.pmax)], Sense::Le, 0.0)
                .unwrap();
            m.add_constraint("capacity_min", key.clone(), vec![Term::new(gen, 1.0), Term::new(on, -unit.pmin)], Sense::Ge, 0.0)
                .unwrap();
            let mut terms = vec![Term::new(start, 1.0), Term::new(on, -1.0)];
            let rhs = match prev_on {
                Some(prev) => {
                    terms.push(Term::new(prev, 1.0));
                    0.0
                }
                None if unit.initially_on => -1.0,
                None => 0.0,
            };
            m.add_constraint("startup_logic", key, terms, Sense::Ge, rhs).unwrap();
            supply[t].push(Term::new(gen, 1.0));
            prev_on = Some(on);
        }
    }

    let inflow = [20.0, 20.0, 20.0];
    let mut prev_storage: Option<VarId> = None;
    for t in 0..periods {
        let key = EntryKey::new("h1", t);
        let turbine = m.add_variable("generation", key.clone(), VarKind::Continuous, 0.0, 80.0, 0.0);
        let spill = m.add_variable("spill", key.clone(), VarKind::Continuous, 0.0, f64::INFINITY, 0.0);
        // final storage carries its opportunity value
        let water_value = if t == periods - 1 { -10.0 } else { 0.0 };
        let storage = m.add_variable("storage", key.clone(), VarKind::Continuous, 0.0, 200.0, water_value);
        let mut terms = vec![Term::new(storage, 1.0), Term::new(turbine, 1.0), Term::new(spill, 1.0)];
        let rhs = match prev_storage {
            Some(prev) => {
                terms.push(Term::new(prev, -1.0));
                inflow[t]
            }
            None => 100.0 + inflow[t],
        };
        m.add_constraint("water_balance", key, terms, Sense::Eq, rhs).unwrap();
        supply[t].push(Term::new(turbine, 1.0));
        prev_storage = Some(storage);
    }

    for (t, mut terms) in supply.into_iter().enumerate() {
        let key = EntryKey::new("north", t);
        let deficit = m.add_variable("deficit", key.clone(), VarKind::Continuous, 0.0, f64::INFINITY, 3000.0);
        terms.push(Term::new(deficit, 1.0));
        m.add_constraint("market_balance", key, terms, Sense::Eq, DEMAND[t]).unwrap();
    }
    m
}

/// One committed unit of 150 MW against a 1000 MW demand.
pub fn short_of_capacity() -> LinearModel {
    let mut m = LinearModel::new("short");
    let key = EntryKey::new("g1", 0);
    let on = m.add_variable("commitment", key.clone(), VarKind::Binary, 0.0, 1.0, 100.0);
    let gen = m.add_variable("generation", key.clone(), VarKind::Continuous, 0.0, 150.0, 20.0);
    m.add_constraint("capacity", key, vec![Term::new(gen, 1.0), Term::new(on, -150.0)], Sense::Le, 0.0)
        .unwrap();
    m.add_constraint("market_balance", EntryKey::new("north", 0), vec![Term::new(gen, 1.0)], Sense::Eq, 1000.0)
        .unwrap();
    m
}

pub fn options(log_dir: &Path) -> SolveOptions {
    SolveOptions::default()
        .with_log_dir(log_dir)
        .with_cost_category("fuel", ["generation"])
        .with_cost_category("no_load", ["commitment"])
        .with_cost_category("startup", ["startup"])
        .with_cost_category("unmet_demand", ["deficit"])
        .with_cost_category("stored_water", ["storage"])
}
