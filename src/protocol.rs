//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Experiment, ExperimentSummary, ProgressRecord, ProgressSummary, StepNumber};
use crate::gate::StepState;
use crate::runner::RunOutcome;
use crate::session::SessionView;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    EnterExperiment {
        #[serde(rename = "learnerId")]
        learner_id: String,
        #[serde(rename = "experimentId")]
        experiment_id: String,
    },
    SelectStep {
        step: StepNumber,
    },
    MarkStepComplete {
        step: StepNumber,
    },
    CompleteSolution,
    RunCode {
        code: String,
        /// Defaults to the last accessed step.
        #[serde(default)]
        step: Option<StepNumber>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Entered {
        experiment: Experiment,
        session: SessionView,
    },
    Session {
        session: SessionView,
    },
    StepRejected {
        step: StepNumber,
        session: SessionView,
    },
    CompleteSolution {
        text: String,
    },
    RunResult {
        outcome: RunOutcome,
    },
    Error {
        kind: String,
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ExperimentsOut {
    pub experiments: Vec<ExperimentSummary>,
}

#[derive(Serialize)]
pub struct CreatedOut {
    pub id: String,
    #[serde(rename = "totalSteps")]
    pub total_steps: usize,
}

#[derive(Serialize)]
pub struct SolutionOut {
    #[serde(rename = "experimentId")]
    pub experiment_id: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct ProgressOut {
    pub progress: ProgressRecord,
    pub gate: Vec<StepState>,
}

/// Body of `PUT .../progress/:experiment`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressIn {
    pub completed_steps: Vec<StepNumber>,
    pub last_accessed_step: StepNumber,
    /// Accepted for compatibility; completion is always recomputed server-side.
    #[serde(default)]
    pub is_completed: Option<bool>,
}

#[derive(Serialize)]
pub struct ProgressListOut {
    #[serde(rename = "learnerId")]
    pub learner_id: String,
    pub progress: BTreeMap<String, ProgressSummary>,
}
