//! `hts backends`: what this build can solve with.

use anyhow::{anyhow, Result};
use hts_algo::{BackendInfo, SolverRegistry};
use hts_cli::OutputFormat;
use std::io::{self, Write};
use tabwriter::TabWriter;

pub fn handle(format: OutputFormat) -> Result<()> {
    let backends = SolverRegistry::global().list();
    match format {
        OutputFormat::Plain => print_table(&backends),
        OutputFormat::Json => print_json(&backends),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn print_table(backends: &[BackendInfo]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "BACKEND\tAVAILABLE\tDUALS\tCONFLICT\tWARM START\tDESCRIPTION")?;
    for b in backends {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            b.id,
            yes_no(b.available),
            yes_no(b.duals),
            yes_no(b.conflict),
            yes_no(b.warm_start),
            b.description
        )?;
    }
    writer.flush()?;

    for b in backends.iter().filter(|b| !b.available) {
        if let Some(hint) = &b.hint {
            println!("{}: {hint}", b.id);
        }
    }
    Ok(())
}

fn print_json(backends: &[BackendInfo]) -> Result<()> {
    serde_json::to_writer_pretty(io::stdout(), backends)
        .map_err(|err| anyhow!("serializing backend list to JSON: {err}"))?;
    println!();
    Ok(())
}
