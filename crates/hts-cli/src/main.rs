use clap::Parser;
use hts_cli::{Cli, Commands};
use hts_solver_common::{ExitCode, SolverError};
use std::io;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Exit code of a run aborted before any solve outcome existed.
fn error_exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SolverError>()
        .map(|e| e.exit_code())
        .unwrap_or(ExitCode::InvalidInput)
        .code()
}

fn main() {
    let cli = Cli::parse();

    // stdout carries results (JSON listings included), logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: could not install log subscriber: {err}");
    }

    let outcome = match &cli.command {
        Commands::Solve(args) => commands::solve::handle(args),
        Commands::Diagnose(args) => commands::diagnose::handle(args),
        Commands::Backends { format } => commands::backends::handle(*format).map(|_| 0),
    };

    let code = match outcome {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            error_exit_code(&err)
        }
    };
    std::process::exit(code);
}
