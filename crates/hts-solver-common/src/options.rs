//! Solve configuration.
//!
//! [`SolveOptions`] is an immutable value passed to every solve call. It can be
//! built in code with the `with_*` methods or loaded from TOML:
//!
//! ```toml
//! backend = "highs"
//! time_limit_seconds = 600
//! mip_gap = 0.005
//! verbosity = 1
//! pricing = true
//!
//! [backend_options]
//! threads = 4
//! presolve = "on"
//!
//! [cost_categories]
//! fuel = ["generation"]
//! startup = ["startup"]
//! ```

use crate::error::{SolverError, SolverResult};
use crate::result::SolveResult;
use crate::BackendId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend-specific passthrough value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl OptionValue {
    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(i) => Some(*i as f64),
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            OptionValue::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "integer",
            OptionValue::Float(_) => "float",
            OptionValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

/// Parse a `key=value` command-line pair, inferring the value type.
pub fn parse_option_pair(pair: &str) -> SolverResult<(String, OptionValue)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| SolverError::InvalidOptions(format!("expected key=value, got '{pair}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(SolverError::InvalidOptions(format!(
            "empty option name in '{pair}'"
        )));
    }
    let raw = raw.trim();
    let value = if let Ok(b) = raw.parse::<bool>() {
        OptionValue::Bool(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        OptionValue::Int(i)
    } else if let Ok(x) = raw.parse::<f64>() {
        OptionValue::Float(x)
    } else {
        OptionValue::Str(raw.to_string())
    };
    Ok((key.to_string(), value))
}

fn default_time_limit() -> f64 {
    3600.0
}

fn default_mip_gap() -> f64 {
    0.01
}

fn default_verbosity() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_balance_group() -> String {
    "market_balance".to_string()
}

/// Configuration of one solve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOptions {
    #[serde(default)]
    pub backend: BackendId,
    /// Wall-clock budget per backend call, in seconds.
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: f64,
    /// Relative optimality gap at which a MIP search may stop.
    #[serde(default = "default_mip_gap")]
    pub mip_gap: f64,
    /// 0 silent, 1 summary, 2 detailed.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
    /// Run the fixed-commitment pricing solve after the commitment solve.
    #[serde(default = "default_true")]
    pub pricing: bool,
    /// Explicit log file; auto-named under `log_dir` when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub backend_options: BTreeMap<String, OptionValue>,
    /// Prior result whose values seed the commitment solve.
    #[serde(skip)]
    pub warm_start: Option<SolveResult>,
    /// Use the builtin backend when the requested one is unavailable.
    #[serde(default = "default_true")]
    pub fallback_to_default: bool,
    /// Constraint group whose duals are the market prices.
    #[serde(default = "default_balance_group")]
    pub balance_group: String,
    /// Cost category -> variable groups, for the cost breakdown.
    #[serde(default)]
    pub cost_categories: BTreeMap<String, Vec<String>>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            backend: BackendId::default(),
            time_limit_seconds: default_time_limit(),
            mip_gap: default_mip_gap(),
            verbosity: default_verbosity(),
            pricing: true,
            log_file: None,
            log_dir: default_log_dir(),
            backend_options: BTreeMap::new(),
            warm_start: None,
            fallback_to_default: true,
            balance_group: default_balance_group(),
            cost_categories: BTreeMap::new(),
        }
    }
}

impl SolveOptions {
    pub fn with_backend(mut self, backend: BackendId) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = level;
        self
    }

    pub fn with_pricing(mut self, pricing: bool) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.backend_options.insert(key.into(), value.into());
        self
    }

    pub fn with_warm_start(mut self, prior: SolveResult) -> Self {
        self.warm_start = Some(prior);
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback_to_default = fallback;
        self
    }

    pub fn with_balance_group(mut self, group: impl Into<String>) -> Self {
        self.balance_group = group.into();
        self
    }

    pub fn with_cost_category<I, S>(mut self, category: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cost_categories
            .insert(category.into(), groups.into_iter().map(Into::into).collect());
        self
    }

    /// Time limit as a `Duration`. Only meaningful after [`validate`](Self::validate).
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_seconds).unwrap_or(Duration::MAX)
    }

    /// Reject values that can never be right. Called before every solve.
    pub fn validate(&self) -> SolverResult<()> {
        if !(self.time_limit_seconds.is_finite() && self.time_limit_seconds > 0.0) {
            return Err(SolverError::InvalidOptions(format!(
                "time_limit_seconds must be a positive number, got {}",
                self.time_limit_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.mip_gap) {
            return Err(SolverError::InvalidOptions(format!(
                "mip_gap must be within [0, 1], got {}",
                self.mip_gap
            )));
        }
        if self.verbosity > 2 {
            return Err(SolverError::InvalidOptions(format!(
                "verbosity must be 0, 1 or 2, got {}",
                self.verbosity
            )));
        }
        if self.balance_group.trim().is_empty() {
            return Err(SolverError::InvalidOptions(
                "balance_group must not be empty".into(),
            ));
        }
        for (key, value) in &self.backend_options {
            if key.trim().is_empty() {
                return Err(SolverError::InvalidOptions(
                    "backend option with empty name".into(),
                ));
            }
            if matches!(value, OptionValue::Float(x) if !x.is_finite()) {
                return Err(SolverError::InvalidOptions(format!(
                    "backend option '{key}' must be finite"
                )));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> SolverResult<Self> {
        let options: SolveOptions =
            toml::from_str(s).map_err(|e| SolverError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> SolverResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| SolverError::Config(format!("{}: {e}", path.display())))
    }
}
