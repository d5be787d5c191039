use crate::dataset::{self, MissingReport};
use crate::executors::ExecOutcome;
use crate::guard::{flagged_columns, GuardAction};
use crate::llm_protocol::build_prompt;
use anyhow::{bail, Result};
use polars::prelude::DataFrame;

/// Where the current generation cycle stands. One cycle walks
/// Idle -> InstructionEntered -> (GuardPrompt) -> Generating and ends back
/// at Idle; the terminal outcome travels back to the caller as a
/// [`CycleOutcome`] value rather than a resting state.
#[derive(Debug, Clone)]
pub enum CycleState {
    Idle,
    InstructionEntered { instruction: String },
    GuardPrompt { instruction: String, working: DataFrame, flagged: Vec<String> },
    Generating { instruction: String, working: DataFrame },
}

impl CycleState {
    fn name(&self) -> &'static str {
        match self {
            CycleState::Idle => "Idle",
            CycleState::InstructionEntered { .. } => "InstructionEntered",
            CycleState::GuardPrompt { .. } => "GuardPrompt",
            CycleState::Generating { .. } => "Generating",
        }
    }
}

/// The two failure domains of a cycle, caught at their own boundaries and
/// reported with distinct labels. Neither is fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("failed to get a response from the completion API: {0}")]
    Generation(String),
    #[error("error during code execution: {0}")]
    Execution(String),
}

#[derive(Debug)]
pub enum CycleOutcome {
    Executed,
    Failed(CycleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationGate {
    /// No flagged columns; the cycle moved straight to Generating.
    Ready,
    /// The guard found columns needing a user decision first.
    NeedsGuardChoice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResolution {
    Proceed { rows_dropped: usize },
    Cancelled,
}

/// All mutable state of the single active session. Handlers receive this by
/// reference; there are no ambient globals.
#[derive(Debug, Default)]
pub struct Session {
    dataset: Option<DataFrame>,
    missing: MissingReport,
    last_result: Option<DataFrame>,
    last_bindings: serde_json::Map<String, serde_json::Value>,
    state: CycleState,
}

impl Default for CycleState {
    fn default() -> Self {
        CycleState::Idle
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn dataset(&self) -> Option<&DataFrame> {
        self.dataset.as_ref()
    }

    pub fn missing_report(&self) -> &MissingReport {
        &self.missing
    }

    pub fn last_result(&self) -> Option<&DataFrame> {
        self.last_result.as_ref()
    }

    pub fn last_bindings(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.last_bindings
    }

    /// The cycle's working copy, once one exists (GuardPrompt or Generating).
    pub fn working(&self) -> Option<&DataFrame> {
        match &self.state {
            CycleState::GuardPrompt { working, .. } | CycleState::Generating { working, .. } => Some(working),
            _ => None,
        }
    }

    /// Event: file uploaded. Replaces the dataset wholesale, recomputes the
    /// missing-value report, and abandons any cycle in flight.
    pub fn load_dataset(&mut self, df: DataFrame) {
        self.missing = MissingReport::of(&df);
        self.dataset = Some(df);
        self.state = CycleState::Idle;
    }

    /// Event: instruction submitted. Editable until generation starts.
    pub fn submit_instruction(&mut self, text: &str) -> Result<()> {
        if self.dataset.is_none() {
            bail!("no dataset loaded");
        }
        match self.state {
            CycleState::Idle | CycleState::InstructionEntered { .. } => {
                self.state = CycleState::InstructionEntered { instruction: text.to_string() };
                Ok(())
            }
            ref other => bail!("cannot change the instruction while {}", other.name()),
        }
    }

    /// Event: generate clicked. Clones the dataset into the cycle's working
    /// copy and runs the missing-value guard against it.
    pub fn request_generation(&mut self) -> Result<GenerationGate> {
        let instruction = match &self.state {
            CycleState::InstructionEntered { instruction } => instruction.clone(),
            other => bail!("cannot generate from {}", other.name()),
        };
        let working = self.dataset.as_ref().expect("instruction requires a dataset").clone();
        let flagged = flagged_columns(&instruction, &self.missing);
        if flagged.is_empty() {
            self.state = CycleState::Generating { instruction, working };
            Ok(GenerationGate::Ready)
        } else {
            self.state = CycleState::GuardPrompt { instruction, working, flagged: flagged.clone() };
            Ok(GenerationGate::NeedsGuardChoice(flagged))
        }
    }

    /// Event: guard choice made. Cancel aborts the cycle before any prompt
    /// is built. DropRows reduces the working copy only; the session
    /// dataset is untouched until an execution succeeds.
    pub fn resolve_guard(&mut self, action: GuardAction) -> Result<GuardResolution> {
        if !matches!(self.state, CycleState::GuardPrompt { .. }) {
            bail!("no guard prompt pending in {}", self.state.name());
        }
        let (instruction, working, flagged) = match std::mem::take(&mut self.state) {
            CycleState::GuardPrompt { instruction, working, flagged } => (instruction, working, flagged),
            _ => unreachable!(),
        };
        match action {
            GuardAction::Cancel => {
                self.state = CycleState::Idle;
                Ok(GuardResolution::Cancelled)
            }
            GuardAction::KeepAll => {
                self.state = CycleState::Generating { instruction, working };
                Ok(GuardResolution::Proceed { rows_dropped: 0 })
            }
            GuardAction::DropRows => {
                let before = working.height();
                let reduced = dataset::drop_missing_rows(&working, &flagged)?;
                let rows_dropped = before - reduced.height();
                self.state = CycleState::Generating { instruction, working: reduced };
                Ok(GuardResolution::Proceed { rows_dropped })
            }
        }
    }

    /// The prompt for the current cycle; fresh per call, same every call.
    pub fn prompt(&self) -> Result<String> {
        match &self.state {
            CycleState::Generating { instruction, working } => {
                let columns: Vec<String> =
                    working.get_column_names().iter().map(|s| s.to_string()).collect();
                Ok(build_prompt(&columns, instruction))
            }
            other => bail!("no generation in flight in {}", other.name()),
        }
    }

    /// The remote call failed. Nothing was mutated; the cycle ends.
    pub fn fail_generation(&mut self, message: String) -> CycleOutcome {
        self.state = CycleState::Idle;
        CycleOutcome::Failed(CycleError::Generation(message))
    }

    /// Applies an execution attempt's outcome. Success replaces the dataset
    /// and the ExecutionResult wholesale; failure leaves both exactly as
    /// they were.
    pub fn apply_execution(&mut self, outcome: ExecOutcome) -> CycleOutcome {
        self.state = CycleState::Idle;
        match outcome {
            ExecOutcome { ok: true, dataset: Some(result), bindings, .. } => {
                self.missing = MissingReport::of(&result);
                self.dataset = Some(result.clone());
                self.last_result = Some(result);
                self.last_bindings = bindings;
                CycleOutcome::Executed
            }
            ExecOutcome { message, .. } => CycleOutcome::Failed(CycleError::Execution(message)),
        }
    }
}
