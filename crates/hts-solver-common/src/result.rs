//! Outcome of one solve attempt.

use crate::status::{RawTermination, SolveStatus};
use crate::BackendId;
use hts_core::{EntryKey, HtsResult, ValueTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Immutable record of a single backend call.
///
/// `objective` and `values` are present only when a primal solution exists;
/// `duals` only when the solve was continuous and the backend reported valid
/// duals. Absence is represented by `None` / empty maps, never by zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub termination: RawTermination,
    pub objective: Option<f64>,
    pub solve_time_seconds: f64,
    #[serde(default)]
    pub values: BTreeMap<String, ValueTable>,
    #[serde(default)]
    pub duals: BTreeMap<String, ValueTable>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Relative gap between incumbent and best bound, when the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mip_gap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
}

impl SolveResult {
    /// A result for a backend call that never happened.
    pub fn not_solved(backend: BackendId) -> Self {
        Self {
            status: SolveStatus::NotSolved,
            termination: RawTermination::new(backend, "not_solved"),
            objective: None,
            solve_time_seconds: 0.0,
            values: BTreeMap::new(),
            duals: BTreeMap::new(),
            log_file: None,
            mip_gap: None,
            nodes: None,
        }
    }

    pub fn has_values(&self) -> bool {
        self.values.values().any(|t| !t.is_empty())
    }

    pub fn has_duals(&self) -> bool {
        self.duals.values().any(|t| !t.is_empty())
    }

    pub fn value(&self, group: &str, entity: &str, period: usize) -> Option<f64> {
        self.values.get(group)?.get(&EntryKey::new(entity, period))
    }

    pub fn dual(&self, group: &str, entity: &str, period: usize) -> Option<f64> {
        self.duals.get(group)?.get(&EntryKey::new(entity, period))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> HtsResult<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> HtsResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
