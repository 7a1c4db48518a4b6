//! `hts solve`: commitment, pricing, and the files derived from them.

use super::{fmt_objective, load_model};
use anyhow::{Context, Result};
use hts_algo::TwoStageResult;
use hts_cli::SolveArgs;
use hts_solver_common::SolveResult;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Run the solve and return the process exit code of the commitment status.
pub fn handle(args: &SolveArgs) -> Result<i32> {
    let mut model = load_model(&args.model)?;
    let mut options = args.solver.solve_options()?;
    if args.no_pricing {
        options.pricing = false;
    }
    if let Some(level) = args.verbosity {
        options.verbosity = level;
    }
    if let Some(path) = &args.warm_start {
        options = options.with_warm_start(load_prior(path)?);
    }

    info!(model = model.name(), backend = %options.backend, "solving");
    let result = hts_algo::solve(&mut model, &options)?;
    print_summary(model.name(), &result);

    if let Some(path) = &args.output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &result)
            .with_context(|| format!("writing result to {}", path.display()))?;
        println!("Result written to {}", path.display());
    }
    if let Some(path) = &args.prices {
        result
            .prices
            .write_csv(path)
            .with_context(|| format!("writing prices to {}", path.display()))?;
        println!("Prices written to {}", path.display());
    }

    Ok(result.commitment.status.exit_code())
}

/// A prior run: either a full `hts solve --output` file or a bare solve result.
fn load_prior(path: &Path) -> Result<SolveResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading warm start {}", path.display()))?;
    if let Ok(full) = serde_json::from_str::<TwoStageResult>(&text) {
        return Ok(full.commitment);
    }
    serde_json::from_str::<SolveResult>(&text)
        .with_context(|| format!("parsing warm start {}", path.display()))
}

fn print_summary(name: &str, result: &TwoStageResult) {
    let commitment = &result.commitment;
    println!("Model        : {name}");
    println!(
        "Commitment   : {} ({}) objective {} in {:.3} s",
        commitment.status,
        commitment.termination,
        fmt_objective(commitment.objective),
        commitment.solve_time_seconds
    );
    if let Some(gap) = commitment.mip_gap {
        println!("  MIP gap    : {:.4}%", gap * 100.0);
    }
    match &result.pricing {
        Some(pricing) => println!(
            "Pricing      : {} ({}) objective {}",
            pricing.status,
            pricing.termination,
            fmt_objective(pricing.objective)
        ),
        None => println!("Pricing      : skipped"),
    }
    let available = result.prices.rows.iter().filter(|r| r.price.is_some()).count();
    println!(
        "Prices       : {} rows, {} available",
        result.prices.len(),
        available
    );
    if !result.costs.components.is_empty() {
        println!("Costs:");
        for component in &result.costs.components {
            println!("  {:<14} {:>16.2}", component.name, component.value);
        }
        println!("  {:<14} {:>16.2}", "total", result.costs.total);
    }
    if let Some(path) = &result.log_file {
        println!("Log file     : {}", path.display());
    }
}
