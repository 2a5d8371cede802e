//! Progress session controller.
//!
//! A [`ProgressSession`] is the state one learner holds while working through
//! one experiment. Local transitions (`select_step`, `mark_step_complete`) are
//! synchronous and applied in the order they arrive. Persistence is handed to a
//! background saver which debounces: every change replaces the pending
//! snapshot, and only the snapshot still current once the window has passed
//! quietly is written.
//!
//! Failure handling:
//!   - a save superseded while in flight is abandoned; its result is ignored
//!   - a failed save is reported through [`ProgressSession::last_save_failed`]
//!     and is retried only when a later local change starts a new cycle
//!   - local state is never rolled back after a failed save

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, instrument, warn};

use crate::domain::{is_complete, Experiment, StepNumber};
use crate::error::{require_id, LabError, Result};
use crate::gate::{self, StepState};
use crate::repository::ExperimentRepository;
use crate::store::ProgressStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    pub debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { debounce: DEFAULT_DEBOUNCE }
    }
}

/// Outcome of a navigation request. `Locked` is an expected answer, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepSelection {
    Selected,
    Locked,
}

/// What the saver last settled on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saved { revision: u64 },
    Failed { revision: u64, error: LabError },
}

/// Pending state handed to the saver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub revision: u64,
    pub completed_steps: Vec<StepNumber>,
    pub last_accessed_step: StepNumber,
}

/// Everything the presentation layer needs to draw the experiment page.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub experiment_id: String,
    pub completed_steps: BTreeSet<StepNumber>,
    pub last_accessed_step: StepNumber,
    pub is_completed: bool,
    pub gate: Vec<StepState>,
    /// Lowest open, unfinished step; `None` once everything is done.
    pub next_open_step: Option<StepNumber>,
    pub last_save_failed: bool,
}

pub struct ProgressSession {
    learner_id: String,
    experiment: Arc<Experiment>,
    completed: BTreeSet<StepNumber>,
    last_accessed: StepNumber,
    saver: DebouncedSaver,
}

impl ProgressSession {
    /// Load the experiment and the learner's record (creating the default
    /// record if needed) and start the saver for this session.
    #[instrument(level = "info", skip(experiments, store, settings))]
    pub async fn enter_experiment(
        experiments: &dyn ExperimentRepository,
        store: Arc<dyn ProgressStore>,
        learner_id: &str,
        experiment_id: &str,
        settings: SessionSettings,
    ) -> Result<Self> {
        let learner_id = require_id("learnerId", learner_id)?.to_string();
        let experiment = experiments.get_experiment(experiment_id).await?;
        let record = store.get_progress(&learner_id, &experiment.id).await?;

        let total = experiment.total_steps();
        // A re-published experiment may have fewer steps than the stored record knows about.
        let completed: BTreeSet<StepNumber> = record
            .completed_steps
            .iter()
            .copied()
            .filter(|&s| s >= 1 && s as usize <= total)
            .collect();
        let last_accessed = record.last_accessed_step.clamp(1, experiment.last_step());

        info!(
            target: "session",
            learner = %learner_id,
            experiment = %experiment.id,
            completed = completed.len(),
            total,
            last = last_accessed,
            "Entered experiment"
        );

        let saver = DebouncedSaver::spawn(
            store,
            learner_id.clone(),
            experiment.id.clone(),
            settings.debounce,
        );
        Ok(Self { learner_id, experiment, completed, last_accessed, saver })
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn experiment(&self) -> &Arc<Experiment> {
        &self.experiment
    }

    pub fn completed_steps(&self) -> &BTreeSet<StepNumber> {
        &self.completed
    }

    pub fn last_accessed_step(&self) -> StepNumber {
        self.last_accessed
    }

    pub fn is_completed(&self) -> bool {
        is_complete(&self.completed, self.experiment.total_steps())
    }

    pub fn gate(&self) -> Vec<StepState> {
        // total_steps >= 1 for every Experiment, so the gate cannot refuse it.
        gate::gate_view(&self.completed, self.experiment.total_steps()).unwrap_or_default()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            experiment_id: self.experiment.id.clone(),
            completed_steps: self.completed.clone(),
            last_accessed_step: self.last_accessed,
            is_completed: self.is_completed(),
            gate: self.gate(),
            next_open_step: gate::first_open_step(&self.completed, self.experiment.total_steps()),
            last_save_failed: self.last_save_failed(),
        }
    }

    /// Navigate to `step` unless it is locked.
    pub fn select_step(&mut self, step: StepNumber) -> Result<StepSelection> {
        let state = gate::step_state(&self.completed, self.experiment.total_steps(), step)?;
        if !state.is_accessible() {
            debug!(target: "session", learner = %self.learner_id, experiment = %self.experiment.id, step, "Locked step requested");
            return Ok(StepSelection::Locked);
        }
        if self.last_accessed != step {
            self.last_accessed = step;
            self.schedule_save();
        }
        Ok(StepSelection::Selected)
    }

    /// Record `step` as done and move on to the next step while unfinished.
    ///
    /// An already completed step is a no-op: nothing moves and no save is
    /// scheduled. The gate is not consulted here.
    pub fn mark_step_complete(&mut self, step: StepNumber) -> Result<SessionView> {
        gate::check_step(self.experiment.total_steps(), step)?;
        if self.completed.contains(&step) {
            return Ok(self.view());
        }

        self.completed.insert(step);
        if !self.is_completed() {
            self.last_accessed = (step + 1).min(self.experiment.last_step());
        }

        info!(
            target: "session",
            learner = %self.learner_id,
            experiment = %self.experiment.id,
            step,
            completed = self.completed.len(),
            is_completed = self.is_completed(),
            "Step completed"
        );
        self.schedule_save();
        Ok(self.view())
    }

    pub fn save_status(&self) -> SaveStatus {
        self.saver.status()
    }

    pub fn last_save_failed(&self) -> bool {
        matches!(self.saver.status(), SaveStatus::Failed { .. })
    }

    /// Stop the saver, writing a snapshot still waiting in the debounce window.
    pub async fn close(self) -> SaveStatus {
        self.saver.close().await
    }

    fn schedule_save(&mut self) {
        self.saver
            .schedule(self.completed.iter().copied().collect(), self.last_accessed);
    }
}

/// Concatenate every step's title and solution in step order.
pub fn complete_solution(experiment: &Experiment) -> String {
    let marker = comment_marker(&experiment.language);
    experiment
        .steps()
        .iter()
        .map(|s| {
            format!(
                "{marker} Step {}: {}\n{}\n",
                s.step_number,
                s.title,
                s.solution_code.trim_end()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn comment_marker(language: &str) -> &'static str {
    match language {
        "python" | "ruby" | "bash" | "shell" | "r" => "#",
        "sql" | "haskell" | "lua" => "--",
        _ => "//",
    }
}

struct DebouncedSaver {
    snapshots: watch::Sender<Option<ProgressSnapshot>>,
    status: watch::Receiver<SaveStatus>,
    task: JoinHandle<()>,
    revision: u64,
}

impl DebouncedSaver {
    fn spawn(
        store: Arc<dyn ProgressStore>,
        learner_id: String,
        experiment_id: String,
        window: Duration,
    ) -> Self {
        let (snapshots, snapshot_rx) = watch::channel(None);
        let (status_tx, status) = watch::channel(SaveStatus::Idle);
        let task = tokio::spawn(run_saver(
            snapshot_rx,
            status_tx,
            store,
            learner_id,
            experiment_id,
            window,
        ));
        Self { snapshots, status, task, revision: 0 }
    }

    fn schedule(&mut self, completed_steps: Vec<StepNumber>, last_accessed_step: StepNumber) {
        self.revision += 1;
        self.snapshots.send_replace(Some(ProgressSnapshot {
            revision: self.revision,
            completed_steps,
            last_accessed_step,
        }));
    }

    fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    async fn close(self) -> SaveStatus {
        let Self { snapshots, status, task, .. } = self;
        drop(snapshots);
        if let Err(e) = task.await {
            warn!(target: "session", error = %e, "Saver task ended abnormally");
        }
        let last = status.borrow().clone();
        last
    }
}

async fn run_saver(
    mut snapshots: watch::Receiver<Option<ProgressSnapshot>>,
    status: watch::Sender<SaveStatus>,
    store: Arc<dyn ProgressStore>,
    learner_id: String,
    experiment_id: String,
    window: Duration,
) {
    loop {
        if snapshots.changed().await.is_err() {
            break;
        }

        // Restart the window on every change; flush right away once the session is gone.
        let mut closed = false;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(window) => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        closed = true;
                        break;
                    }
                }
            }
        }

        let Some(snapshot) = snapshots.borrow_and_update().clone() else {
            continue;
        };
        let result = store
            .save_progress(
                &learner_id,
                &experiment_id,
                &snapshot.completed_steps,
                snapshot.last_accessed_step,
            )
            .await;

        let latest = snapshots.borrow().as_ref().map(|s| s.revision);
        if latest != Some(snapshot.revision) {
            debug!(target: "session", learner = %learner_id, experiment = %experiment_id, revision = snapshot.revision, "Superseded save ignored");
            continue;
        }

        match result {
            Ok(_) => {
                debug!(target: "session", learner = %learner_id, experiment = %experiment_id, revision = snapshot.revision, "Debounced save done");
                status.send_replace(SaveStatus::Saved { revision: snapshot.revision });
            }
            Err(error) => {
                warn!(target: "session", learner = %learner_id, experiment = %experiment_id, revision = snapshot.revision, %error, "Debounced save failed; waiting for next change");
                status.send_replace(SaveStatus::Failed { revision: snapshot.revision, error });
            }
        }

        if closed {
            break;
        }
    }
}
