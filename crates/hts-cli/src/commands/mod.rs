pub mod backends;
pub mod diagnose;
pub mod solve;

use anyhow::{Context, Result};
use hts_core::LinearModel;
use std::path::Path;

pub fn load_model(path: &Path) -> Result<LinearModel> {
    LinearModel::load(path).with_context(|| format!("loading model {}", path.display()))
}

pub fn fmt_objective(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".to_string())
}
