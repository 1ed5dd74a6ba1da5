//! Status vocabularies.
//!
//! Backends report step and run statuses under a loose provider vocabulary
//! (`completed`, `done`, `in-progress`, `failed`, ...). Everything is mapped
//! onto closed sets here so that no other code ever branches on raw strings.

use serde::{Deserialize, Serialize};

/// The externally visible lifecycle state of a connector.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Inactive,
    Creating,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl std::fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let val = match self {
            Self::Inactive => "inactive",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        write!(f, "{}", val)
    }
}

/// The normalized status of a pipeline step.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
}

/// The normalized status of a pipeline run; same closed set as steps.
pub type RunStatus = StepStatus;

impl StepStatus {
    /// Map a provider status string onto the closed set.
    ///
    /// Unknown or absent vocabulary maps to `Pending`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "running" | "in_progress" | "active" | "processing" | "started" => Self::Running,
            "success" | "succeeded" | "completed" | "complete" | "done" | "finished" => Self::Success,
            "failure" | "failed" | "error" | "errored" | "aborted" => Self::Failure,
            _ => Self::Pending,
        }
    }
}
