//! `hts diagnose`: solve once and, if infeasible, search for the conflict.

use super::load_model;
use anyhow::{Context, Result};
use hts_algo::{write_report, IisResult, Orchestrator, SolveStatus};
use hts_cli::DiagnoseArgs;

pub fn handle(args: &DiagnoseArgs) -> Result<i32> {
    let mut model = load_model(&args.model)?;
    let options = args.solver.solve_options()?.with_pricing(false);

    let orchestrator = Orchestrator::default();
    let result = orchestrator.solve(&mut model, &options)?;
    let status = result.commitment.status;
    if status != SolveStatus::Infeasible {
        println!("Model {} is {status}; nothing to diagnose.", model.name());
        return Ok(status.exit_code());
    }

    let iis = orchestrator.diagnose(&model, &options);
    print_conflicts(&iis);
    if let Some(path) = &args.report {
        write_report(&iis, path).with_context(|| format!("writing report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(status.exit_code())
}

fn print_conflicts(iis: &IisResult) {
    println!("Conflict search: {}", iis.status);
    if let Some(note) = &iis.note {
        println!("  {note}");
    }
    for (i, conflict) in iis.conflicts.iter().enumerate() {
        println!(
            "  [{}] {:<11} {}: {}",
            i + 1,
            conflict.kind.as_str(),
            conflict.name,
            conflict.expression
        );
    }
}
