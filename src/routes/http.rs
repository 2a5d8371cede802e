//! HTTP endpoint handlers. These are thin wrappers that forward to the repository,
//! the progress store and the gate. Each handler is instrumented and logs its
//! parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::draft::ExperimentDraft;
use crate::error::Result;
use crate::gate::gate_view;
use crate::protocol::*;
use crate::session::complete_solution;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_experiments(State(state): State<Arc<AppState>>) -> Result<Json<ExperimentsOut>> {
  let experiments = state.experiments.list_experiments().await?;
  Ok(Json(ExperimentsOut { experiments }))
}

#[instrument(level = "info", skip(state, draft), fields(title = %draft.title, steps = draft.steps.len()))]
pub async fn http_create_experiment(
  State(state): State<Arc<AppState>>,
  Json(draft): Json<ExperimentDraft>,
) -> Result<impl IntoResponse> {
  let experiment = draft.validate()?;
  let stored = state.experiments.insert_experiment(experiment).await?;
  info!(target: "experiment", id = %stored.id, total_steps = stored.total_steps(), "HTTP experiment created");
  Ok((StatusCode::CREATED, Json(CreatedOut { id: stored.id.clone(), total_steps: stored.total_steps() })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_experiment(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse> {
  let experiment = state.experiments.get_experiment(&id).await?;
  Ok(Json(experiment.as_ref().clone()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_experiment(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode> {
  state.experiments.delete_experiment(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_solution(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SolutionOut>> {
  let experiment = state.experiments.get_experiment(&id).await?;
  Ok(Json(SolutionOut { experiment_id: experiment.id.clone(), text: complete_solution(&experiment) }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_progress(
  State(state): State<Arc<AppState>>,
  Path(learner_id): Path<String>,
) -> Result<Json<ProgressListOut>> {
  let progress = state.progress.list_progress(&learner_id).await?;
  info!(target: "progress", learner = %learner_id, experiments = progress.len(), "HTTP progress summaries served");
  Ok(Json(ProgressListOut { learner_id, progress }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path((learner_id, experiment_id)): Path<(String, String)>,
) -> Result<Json<ProgressOut>> {
  let experiment = state.experiments.get_experiment(&experiment_id).await?;
  let progress = state.progress.get_progress(&learner_id, &experiment.id).await?;
  let gate = gate_view(&progress.completed_steps, experiment.total_steps())?;
  Ok(Json(ProgressOut { progress, gate }))
}

#[instrument(level = "info", skip(state, body), fields(completed = body.completed_steps.len(), last = body.last_accessed_step))]
pub async fn http_put_progress(
  State(state): State<Arc<AppState>>,
  Path((learner_id, experiment_id)): Path<(String, String)>,
  Json(body): Json<SaveProgressIn>,
) -> Result<Json<ProgressOut>> {
  let experiment = state.experiments.get_experiment(&experiment_id).await?;
  let progress = state
    .progress
    .save_progress(&learner_id, &experiment.id, &body.completed_steps, body.last_accessed_step)
    .await?;
  if let Some(claimed) = body.is_completed {
    if claimed != progress.is_completed {
      info!(target: "progress", learner = %learner_id, experiment = %experiment_id, claimed, actual = progress.is_completed, "Ignored client completion flag");
    }
  }
  let gate = gate_view(&progress.completed_steps, experiment.total_steps())?;
  Ok(Json(ProgressOut { progress, gate }))
}
