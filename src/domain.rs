//! Domain models: experiments with their steps and test cases, and the
//! per-learner progress record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Steps are numbered from 1.
pub type StepNumber = u32;

/// Declarative input/expected-output pair. Never executed by this crate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
  pub input: String,
  pub expected_output: String,
}

/// One unit of an experiment. Only exists inside its experiment.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
  pub step_number: StepNumber,
  pub title: String,
  pub instruction: String,
  pub starter_code: String,
  pub solution_code: String,
  pub test_cases: Vec<TestCase>,
}

/// A validated, immutable experiment.
///
/// Steps are always numbered `1..=N` with `N >= 1`; the only way to build one is
/// [`crate::draft::ExperimentDraft::validate`], so the invariant holds for every value.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
  pub id: String,
  pub title: String,
  pub language: String,
  pub description: String,
  pub reference_doc_url: Option<String>,
  pub video_url: Option<String>,
  steps: Vec<Step>,
}

impl Experiment {
  /// Caller guarantees `steps` is non-empty and densely numbered from 1.
  pub(crate) fn from_validated_parts(
    id: String,
    title: String,
    language: String,
    description: String,
    reference_doc_url: Option<String>,
    video_url: Option<String>,
    steps: Vec<Step>,
  ) -> Self {
    debug_assert!(!steps.is_empty());
    debug_assert!(steps.iter().enumerate().all(|(i, s)| s.step_number as usize == i + 1));
    Self { id, title, language, description, reference_doc_url, video_url, steps }
  }

  pub fn steps(&self) -> &[Step] { &self.steps }

  pub fn total_steps(&self) -> usize { self.steps.len() }

  pub fn step(&self, number: StepNumber) -> Option<&Step> {
    let idx = (number as usize).checked_sub(1)?;
    self.steps.get(idx)
  }

  pub fn last_step(&self) -> StepNumber { self.steps.len() as StepNumber }
}

/// Catalogue row for dashboards.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
  pub id: String,
  pub title: String,
  pub language: String,
  pub total_steps: usize,
}

impl From<&Experiment> for ExperimentSummary {
  fn from(e: &Experiment) -> Self {
    Self {
      id: e.id.clone(),
      title: e.title.clone(),
      language: e.language.clone(),
      total_steps: e.total_steps(),
    }
  }
}

/// Durable per-(learner, experiment) progress.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  pub learner_id: String,
  pub experiment_id: String,
  pub completed_steps: BTreeSet<StepNumber>,
  pub last_accessed_step: StepNumber,
  pub is_completed: bool,
  pub last_modified_at: DateTime<Utc>,
}

impl ProgressRecord {
  /// The lazily created record: nothing completed, positioned on step 1.
  pub fn fresh(learner_id: &str, experiment_id: &str) -> Self {
    Self {
      learner_id: learner_id.to_string(),
      experiment_id: experiment_id.to_string(),
      completed_steps: BTreeSet::new(),
      last_accessed_step: 1,
      is_completed: false,
      last_modified_at: Utc::now(),
    }
  }

  pub fn summary(&self) -> ProgressSummary {
    ProgressSummary {
      completed_steps: self.completed_steps.clone(),
      is_completed: self.is_completed,
      last_accessed_step: self.last_accessed_step,
    }
  }
}

/// Completion is defined by count, so any completion order counts.
pub fn is_complete(completed: &BTreeSet<StepNumber>, total_steps: usize) -> bool {
  total_steps > 0 && completed.len() == total_steps
}

/// Dashboard view of one experiment's progress.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
  pub completed_steps: BTreeSet<StepNumber>,
  pub is_completed: bool,
  pub last_accessed_step: StepNumber,
}
