pub mod cli;

pub use cli::{Cli, Commands, DiagnoseArgs, OutputFormat, SolveArgs, SolverArgs};
