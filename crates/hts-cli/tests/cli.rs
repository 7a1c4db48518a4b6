use assert_cmd::Command;
use hts_core::{EntryKey, LinearModel, Sense, Term, VarKind};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Two units against two periods of demand in one zone.
fn write_dispatch_model(dir: &Path) -> PathBuf {
    let mut m = LinearModel::new("two-unit");
    let demand = [80.0, 140.0];
    for (t, load) in demand.iter().enumerate() {
        let mut supply = Vec::new();
        for (unit, pmax, marginal, no_load) in [("base", 100.0, 20.0, 200.0), ("peak", 60.0, 50.0, 40.0)] {
            let key = EntryKey::new(unit, t);
            let on = m.add_variable("commitment", key.clone(), VarKind::Binary, 0.0, 1.0, no_load);
            let gen = m.add_variable("generation", key.clone(), VarKind::Continuous, 0.0, pmax, marginal);
            m.add_constraint("capacity", key, vec![Term::new(gen, 1.0), Term::new(on, -pmax)], Sense::Le, 0.0)
                .unwrap();
            supply.push(Term::new(gen, 1.0));
        }
        m.add_constraint("market_balance", EntryKey::new("zone", t), supply, Sense::Eq, *load)
            .unwrap();
    }
    let path = dir.join("model.json");
    m.save(&path).unwrap();
    path
}

fn write_infeasible_model(dir: &Path) -> PathBuf {
    let mut m = LinearModel::new("short");
    let key = EntryKey::new("g1", 0);
    let on = m.add_variable("commitment", key.clone(), VarKind::Binary, 0.0, 1.0, 100.0);
    let gen = m.add_variable("generation", key.clone(), VarKind::Continuous, 0.0, 150.0, 20.0);
    m.add_constraint("capacity", key, vec![Term::new(gen, 1.0), Term::new(on, -150.0)], Sense::Le, 0.0)
        .unwrap();
    m.add_constraint("market_balance", EntryKey::new("north", 0), vec![Term::new(gen, 1.0)], Sense::Eq, 1000.0)
        .unwrap();
    let path = dir.join("short.json");
    m.save(&path).unwrap();
    path
}

fn hts() -> Command {
    Command::cargo_bin("hts").unwrap()
}

#[test]
fn hts_solve_writes_result_and_prices() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());
    let output = dir.path().join("result.json");
    let prices = dir.path().join("prices.csv");

    hts()
        .args([
            "solve",
            model.to_str().unwrap(),
            "--log-dir",
            dir.path().join("logs").to_str().unwrap(),
            "--mip-gap",
            "0",
            "-o",
            output.to_str().unwrap(),
            "--prices",
            prices.to_str().unwrap(),
        ])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Commitment   : optimal"))
        .stdout(predicate::str::contains("Prices       : 2 rows, 2 available"));

    let result: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(result["commitment"]["status"], "optimal");
    assert_eq!(result["pricing"]["status"], "optimal");

    let csv = fs::read_to_string(&prices).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("zone,period,price"));
    assert_eq!(lines.count(), 2);
}

#[test]
fn hts_solve_without_pricing_has_no_prices() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());
    let prices = dir.path().join("prices.csv");

    hts()
        .args([
            "solve",
            model.to_str().unwrap(),
            "--log-dir",
            dir.path().to_str().unwrap(),
            "--no-pricing",
            "--prices",
            prices.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pricing      : skipped"));

    // header only
    assert_eq!(fs::read_to_string(&prices).unwrap().trim(), "zone,period,price");
}

#[test]
fn hts_solve_warm_start_from_previous_output() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());
    let first = dir.path().join("first.json");
    let log_dir = dir.path().join("logs");

    hts()
        .args(["solve", model.to_str().unwrap(), "--log-dir", log_dir.to_str().unwrap()])
        .args(["-o", first.to_str().unwrap()])
        .assert()
        .success();

    hts()
        .args(["solve", model.to_str().unwrap(), "--log-dir", log_dir.to_str().unwrap()])
        .args(["--warm-start", first.to_str().unwrap()])
        .assert()
        .success();

    // one auto-named log per run
    assert_eq!(fs::read_dir(&log_dir).unwrap().count(), 2);
}

#[test]
fn hts_solve_infeasible_exits_with_status_code() {
    let dir = tempdir().unwrap();
    let model = write_infeasible_model(dir.path());

    hts()
        .args(["solve", model.to_str().unwrap(), "--log-dir", dir.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("infeasible"));
}

#[test]
fn hts_diagnose_writes_report() {
    let dir = tempdir().unwrap();
    let model = write_infeasible_model(dir.path());
    let report = dir.path().join("iis.txt");

    hts()
        .args([
            "diagnose",
            model.to_str().unwrap(),
            "--log-dir",
            dir.path().to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Conflict search: found"))
        .stdout(predicate::str::contains("market_balance[north,0]"));

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.starts_with("INFEASIBILITY REPORT"));
    assert!(text.contains("upper bound generation[g1,0]"));
    assert!(text.contains("TROUBLESHOOTING CHECKLIST"));
}

#[test]
fn hts_diagnose_feasible_model() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());
    let report = dir.path().join("iis.txt");

    hts()
        .args(["diagnose", model.to_str().unwrap(), "--log-dir", dir.path().to_str().unwrap()])
        .args(["--report", report.to_str().unwrap()])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("nothing to diagnose"));
    assert!(!report.exists());
}

#[test]
fn hts_backends_json_lists_builtin() {
    let out = hts().args(["backends", "--format", "json"]).assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let list: Value = serde_json::from_str(&stdout).unwrap();
    let builtin = list
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["id"] == "builtin")
        .unwrap();
    assert_eq!(builtin["available"], true);
    assert_eq!(builtin["duals"], true);
}

#[test]
fn hts_backends_plain_table() {
    hts()
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("BACKEND"))
        .stdout(predicate::str::contains("builtin"));
}

#[test]
fn hts_rejects_unknown_backend() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());

    hts()
        .args(["solve", model.to_str().unwrap(), "--backend", "cplex"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Unknown backend 'cplex'"));
}

#[test]
fn hts_rejects_bad_time_limit() {
    let dir = tempdir().unwrap();
    let model = write_dispatch_model(dir.path());

    hts()
        .args(["solve", model.to_str().unwrap(), "--time-limit=-5"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("time_limit_seconds"));
}

#[test]
fn hts_reports_missing_model() {
    let dir = tempdir().unwrap();
    hts()
        .args(["solve", dir.path().join("absent.json").to_str().unwrap()])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("loading model"));
}
