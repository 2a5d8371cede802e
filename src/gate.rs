//! Step gate: decides which steps a learner may open.
//!
//! The decision depends only on the completed-step set:
//!   - step 1 is never locked
//!   - step k > 1 opens once step k-1 is completed
//!   - a completed step is always `Completed`, whatever its predecessor
//!
//! The last accessed step plays no part. Everything here is pure.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::StepNumber;
use crate::error::{LabError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Locked,
    Unlocked,
    Completed,
}

impl StepState {
    pub fn is_accessible(self) -> bool {
        !matches!(self, StepState::Locked)
    }
}

/// State of a single step. `step` must be within `1..=total_steps`.
pub fn step_state(
    completed: &BTreeSet<StepNumber>,
    total_steps: usize,
    step: StepNumber,
) -> Result<StepState> {
    check_step(total_steps, step)?;
    Ok(state_of(completed, step))
}

/// States for steps `1..=total_steps`, index 0 being step 1.
pub fn gate_view(completed: &BTreeSet<StepNumber>, total_steps: usize) -> Result<Vec<StepState>> {
    check_total(total_steps)?;
    Ok((1..=total_steps as StepNumber)
        .map(|step| state_of(completed, step))
        .collect())
}

/// Lowest step that is open but not yet completed.
pub fn first_open_step(completed: &BTreeSet<StepNumber>, total_steps: usize) -> Option<StepNumber> {
    (1..=total_steps as StepNumber).find(|&step| state_of(completed, step) == StepState::Unlocked)
}

/// Range check shared with the session controller.
pub fn check_step(total_steps: usize, step: StepNumber) -> Result<()> {
    check_total(total_steps)?;
    if step == 0 || step as usize > total_steps {
        return Err(LabError::invalid(format!(
            "step {step} is outside 1..={total_steps}"
        )));
    }
    Ok(())
}

fn check_total(total_steps: usize) -> Result<()> {
    if total_steps == 0 {
        return Err(LabError::invalid("total step count must be positive"));
    }
    Ok(())
}

fn state_of(completed: &BTreeSet<StepNumber>, step: StepNumber) -> StepState {
    if completed.contains(&step) {
        StepState::Completed
    } else if step == 1 || completed.contains(&(step - 1)) {
        StepState::Unlocked
    } else {
        StepState::Locked
    }
}
