//! Per-solve event log.
//!
//! One line per event: `<RFC3339 timestamp> [<event>] key=value ...`. The
//! file is opened when the solve starts and closed when the [`SolveLog`] is
//! dropped. Write failures after creation are logged and otherwise ignored;
//! a solve never fails because its log could not be appended to.

use chrono::{DateTime, Local, SecondsFormat};
use hts_solver_common::SolveOptions;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Log file name for a run started at `start`.
pub fn auto_log_name(start: DateTime<Local>) -> String {
    format!("solve_{}.log", start.format("%Y%m%d_%H%M%S_%3f"))
}

pub struct SolveLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SolveLog {
    /// Open the log named by `options.log_file`, or an auto-named file in
    /// `options.log_dir`. Parent directories are created as needed.
    pub fn create(options: &SolveOptions) -> io::Result<Self> {
        let path = match &options.log_file {
            Some(path) => path.clone(),
            None => options.log_dir.join(auto_log_name(Local::now())),
        };
        Self::open(path)
    }

    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event line and flush it.
    pub fn event(&mut self, name: &str, fields: &[(&str, String)]) {
        let mut line = format!(
            "{} [{name}]",
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
        );
        for (key, value) in fields {
            let _ = write!(line, " {key}={value}");
        }
        debug!(target: "hts::solve_log", "{line}");
        let written = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush());
        if let Err(err) = written {
            warn!(path = %self.path.display(), error = %err, "failed to append to solve log");
        }
    }
}
