use crate::executors::{pandas::run_pandas_cell, ExecOutcome};
use crate::history::HistoryStore;
use crate::session::{CycleOutcome, Session};
use crate::util::new_run_dir;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// What one execution attempt produced, for the caller to present.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub record_path: PathBuf,
    pub run_dir: PathBuf,
}

/// Runs generated code against the session's working copy.
///
/// The history record is written first: it must exist for every attempt
/// that reaches execution, whether or not execution then succeeds. A
/// failure to write it aborts the cycle (propagates); an execution failure
/// is caught and reported through the outcome.
#[tracing::instrument(skip_all, fields(run_root = %runs_root.display()))]
pub fn execute_generated(
    session: &mut Session,
    history: &HistoryStore,
    runs_root: &Path,
    prompt: &str,
    code: &str,
) -> Result<CycleReport> {
    let record_path = history.write_record(prompt, code)?;
    let run_dir = new_run_dir(Some(runs_root))?;

    let working = match session.working() {
        Some(df) => df.clone(),
        None => anyhow::bail!("no generation in flight"),
    };
    let exec = match run_pandas_cell(&run_dir, code, &working) {
        Ok(outcome) => outcome,
        // Spawn/readback failures belong to the execution domain too.
        Err(e) => ExecOutcome::failed(format!("{e:#}")),
    };
    let outcome = session.apply_execution(exec);
    Ok(CycleReport { outcome, record_path, run_dir })
}
