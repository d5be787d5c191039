pub mod pandas;

use polars::prelude::DataFrame;

/// Result of one execution attempt against the dataset copy.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub ok: bool,
    pub message: String,
    /// Post-execution value of the conventional dataset binding, on success.
    pub dataset: Option<DataFrame>,
    /// Every other name bound during execution, JSON-encoded where the value
    /// allows it and stringified otherwise.
    pub bindings: serde_json::Map<String, serde_json::Value>,
    pub stdout_tail: Option<String>,
    pub stderr_tail: Option<String>,
}

impl ExecOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into(), ..Default::default() }
    }
}
