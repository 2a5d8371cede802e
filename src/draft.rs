//! Authoring input and its validation into an [`Experiment`].
//!
//! Experiments arrive from the authoring flow (often AI-generated) or from the
//! TOML bank as loosely-shaped data. Field names are accepted in both
//! camelCase and snake_case. Nothing reaches the repository without passing
//! [`ExperimentDraft::validate`], so gaps in the step sequence are caught here
//! and never at gate-evaluation time.
//!
//! Numbering rules:
//!   - no step carries a number: steps are numbered by position
//!   - every step carries a number: sorted, and must be exactly `1..=N`
//!   - a mix of both: rejected

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Experiment, Step, StepNumber, TestCase};
use crate::error::{LabError, Result};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExperimentDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "referenceDocUrl", alias = "reference_doc")]
    pub reference_doc_url: Option<String>,
    #[serde(default, alias = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDraft>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StepDraft {
    #[serde(default, alias = "stepNumber")]
    pub step_number: Option<StepNumber>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "instructions")]
    pub instruction: String,
    #[serde(default, alias = "starterCode")]
    pub starter_code: String,
    #[serde(default, alias = "solutionCode")]
    pub solution_code: String,
    #[serde(default, alias = "testCases")]
    pub test_cases: Vec<TestCaseDraft>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TestCaseDraft {
    #[serde(default)]
    pub input: String,
    #[serde(default, alias = "expectedOutput", alias = "expected")]
    pub expected_output: String,
}

impl ExperimentDraft {
    /// Check shape and numbering, producing an immutable experiment.
    pub fn validate(self) -> Result<Experiment> {
        let title = non_blank("title", &self.title)?;
        let language = non_blank("language", &self.language)?.to_lowercase();
        if self.steps.is_empty() {
            return Err(LabError::invalid(format!("experiment '{title}' has no steps")));
        }

        let id = match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let steps = number_steps(self.steps)?;
        for step in &steps {
            if step.test_cases.is_empty() {
                warn!(target: "experiment", %id, step = step.step_number, "Step has no test cases");
            }
        }

        Ok(Experiment::from_validated_parts(
            id,
            title,
            language,
            self.description.trim().to_string(),
            optional_url(self.reference_doc_url),
            optional_url(self.video_url),
            steps,
        ))
    }
}

fn number_steps(drafts: Vec<StepDraft>) -> Result<Vec<Step>> {
    let numbered = drafts.iter().filter(|s| s.step_number.is_some()).count();

    let mut pairs: Vec<(StepNumber, StepDraft)> = if numbered == 0 {
        drafts
            .into_iter()
            .enumerate()
            .map(|(i, s)| ((i + 1) as StepNumber, s))
            .collect()
    } else if numbered == drafts.len() {
        drafts
            .into_iter()
            .map(|s| (s.step_number.unwrap_or_default(), s))
            .collect()
    } else {
        return Err(LabError::invalid(format!(
            "{numbered} of {} steps carry a step number; number all of them or none",
            drafts.len()
        )));
    };

    pairs.sort_by_key(|(n, _)| *n);
    for (expected, (actual, _)) in (1..).zip(pairs.iter()) {
        if *actual != expected {
            let seen: Vec<StepNumber> = pairs.iter().map(|(n, _)| *n).collect();
            return Err(LabError::invalid(format!(
                "step numbers must be 1..={} without gaps or duplicates, got {seen:?}",
                pairs.len()
            )));
        }
    }

    pairs
        .into_iter()
        .map(|(n, s)| {
            let title = if s.title.trim().is_empty() {
                format!("Step {n}")
            } else {
                s.title.trim().to_string()
            };
            Ok(Step {
                step_number: n,
                title,
                instruction: s.instruction,
                starter_code: s.starter_code,
                solution_code: s.solution_code,
                test_cases: s
                    .test_cases
                    .into_iter()
                    .map(|t| TestCase { input: t.input, expected_output: t.expected_output })
                    .collect(),
            })
        })
        .collect()
}

fn non_blank(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LabError::invalid(format!("experiment {field} must not be empty")));
    }
    Ok(v.to_string())
}

fn optional_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}
