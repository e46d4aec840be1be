use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Log marker an execution unit prints when its scenario passed.
pub const SUCCESS_MARKER: &str = "SUCCESS";
/// Log marker an execution unit prints when its scenario failed.
pub const FAILURE_MARKER: &str = "FAILURE";

/// The state of one scenario execution.
///
/// `Unknown` is terminal: the unit finished without telling us whether the scenario passed. It is
/// reported as its own state and never folded into `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Running,
    Success,
    Failure,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Running => "running",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Unknown => "unknown",
        }
    }

    /// Whether the execution has finished, whatever the result.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Failure | Outcome::Unknown)
    }

    /// Classify a finished unit from its log output.
    ///
    /// Exactly one of the markers must be present. A log with neither, or with both, is `Unknown`.
    pub fn from_log(log: &str) -> Self {
        match (log.contains(SUCCESS_MARKER), log.contains(FAILURE_MARKER)) {
            (true, false) => Outcome::Success,
            (false, true) => Outcome::Failure,
            _ => Outcome::Unknown,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unrecognised outcome `{0}`, expected one of pending, running, success, failure, unknown")]
pub struct UnknownOutcomeError(String);

impl FromStr for Outcome {
    type Err = UnknownOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Outcome::Pending),
            "running" => Ok(Outcome::Running),
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            "unknown" => Ok(Outcome::Unknown),
            _ => Err(UnknownOutcomeError(s.to_string())),
        }
    }
}
