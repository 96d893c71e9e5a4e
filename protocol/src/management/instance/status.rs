use serde::{Deserialize, Serialize};

/// How a graceful stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StopOutcome {
    /// The process exited on its own; `code` is `None` when it died from a signal.
    Exited { code: Option<i32> },
    /// The wait bound elapsed and the process is still running.
    TimedOut,
    /// The wait bound elapsed and the process was terminated forcibly.
    Killed,
}

impl StopOutcome {
    pub fn is_stopped(&self) -> bool {
        !matches!(self, StopOutcome::TimedOut)
    }
}
