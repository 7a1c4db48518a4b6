use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use hts_solver_common::{parse_option_pair, BackendId, SolveOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hts",
    author,
    version,
    about = "Hydrothermal unit commitment: solve, price and diagnose",
    long_about = None
)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve a model: commitment, then fixed-commitment pricing
    Solve(SolveArgs),
    /// Explain why a model is infeasible
    Diagnose(DiagnoseArgs),
    /// List solver backends and their capabilities
    Backends {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Options shared by every command that runs a solve.
#[derive(Args, Debug, Clone, Default)]
pub struct SolverArgs {
    /// TOML file with solve options; flags override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Solver backend (builtin, microlp, highs)
    #[arg(long)]
    pub backend: Option<String>,

    /// Wall-clock budget per backend call, in seconds
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Relative MIP gap at which the commitment search may stop
    #[arg(long)]
    pub mip_gap: Option<f64>,

    /// Fail instead of falling back to builtin when the backend is missing
    #[arg(long)]
    pub no_fallback: bool,

    /// Write the solve log here instead of an auto-named file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Directory for auto-named solve logs
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub log_dir: Option<PathBuf>,

    /// Backend passthrough option as key=value (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

impl SolverArgs {
    /// Options from `--config` (or defaults) with the flags applied on top.
    pub fn solve_options(&self) -> Result<SolveOptions> {
        let mut options = match &self.config {
            Some(path) => SolveOptions::from_toml_file(path)
                .with_context(|| format!("loading solve options from {}", path.display()))?,
            None => SolveOptions::default(),
        };
        if let Some(name) = &self.backend {
            options.backend = name.parse::<BackendId>()?;
        }
        if let Some(seconds) = self.time_limit {
            options.time_limit_seconds = seconds;
        }
        if let Some(gap) = self.mip_gap {
            options.mip_gap = gap;
        }
        if self.no_fallback {
            options.fallback_to_default = false;
        }
        if let Some(path) = &self.log_file {
            options.log_file = Some(path.clone());
        }
        if let Some(dir) = &self.log_dir {
            options.log_dir = dir.clone();
        }
        for pair in &self.options {
            let (key, value) = parse_option_pair(pair)?;
            options.backend_options.insert(key, value);
        }
        options.validate()?;
        Ok(options)
    }
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Model file (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Skip the pricing solve; no prices are produced
    #[arg(long)]
    pub no_pricing: bool,

    /// 0 silent, 1 summary, 2 detailed
    #[arg(long)]
    pub verbosity: Option<u8>,

    /// Prior result (JSON) whose values seed the commitment solve
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub warm_start: Option<PathBuf>,

    /// Write the full result as JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Write the price table as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub prices: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Model file (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Write the plain-text infeasibility report here
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub report: Option<PathBuf>,
}
