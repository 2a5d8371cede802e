//! Simulated "Run Code". Nothing is compiled or executed.
//!
//! The runner only produces a plausible console transcript so the editor has
//! something to show. Each caller owns its [`ExecutionHistory`]; the WebSocket
//! handler keeps one per connection.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::{StepNumber, TestCase};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub step_number: StepNumber,
    pub output: String,
    pub simulated: bool,
    pub ran_at: DateTime<Utc>,
}

/// Bounded log of simulated runs, oldest first.
#[derive(Debug)]
pub struct ExecutionHistory {
    limit: usize,
    entries: VecDeque<RunOutcome>,
}

impl ExecutionHistory {
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1), entries: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RunOutcome> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&RunOutcome> {
        self.entries.back()
    }

    fn push(&mut self, outcome: RunOutcome) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(outcome);
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MockRunner;

impl MockRunner {
    #[instrument(level = "debug", skip(self, history, code, test_cases), fields(code_len = code.len(), cases = test_cases.len()))]
    pub fn run(
        &self,
        history: &mut ExecutionHistory,
        language: &str,
        step_number: StepNumber,
        code: &str,
        test_cases: &[TestCase],
    ) -> RunOutcome {
        let lines = code.lines().filter(|l| !l.trim().is_empty()).count();
        let mut output = if lines == 0 {
            format!("[{language}] nothing to run: the editor is empty\n")
        } else {
            format!("[{language}] program finished ({lines} non-empty lines, simulated)\n")
        };
        for (i, case) in test_cases.iter().enumerate() {
            output.push_str(&format!(
                "test {}: input={:?} expected={:?} (not executed)\n",
                i + 1,
                case.input,
                case.expected_output
            ));
        }

        let outcome = RunOutcome { step_number, output, simulated: true, ran_at: Utc::now() };
        history.push(outcome.clone());
        debug!(target: "runner", %language, step_number, history = history.len(), "Simulated run recorded");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histories_are_independent() {
        let runner = MockRunner;
        let mut a = ExecutionHistory::default();
        let b = ExecutionHistory::default();
        runner.run(&mut a, "python", 1, "print(1)", &[]);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn history_evicts_oldest() {
        let runner = MockRunner;
        let mut h = ExecutionHistory::new(2);
        for step in 1..=3 {
            runner.run(&mut h, "rust", step, "fn main() {}", &[]);
        }
        let steps: Vec<StepNumber> = h.entries().map(|o| o.step_number).collect();
        assert_eq!(steps, vec![2, 3]);
        assert_eq!(h.latest().map(|o| o.step_number), Some(3));
    }

    #[test]
    fn output_lists_declared_test_cases() {
        let runner = MockRunner;
        let mut h = ExecutionHistory::default();
        let cases = vec![TestCase { input: "2".into(), expected_output: "4".into() }];
        let out = runner.run(&mut h, "python", 1, "x = 2\nprint(x * 2)\n", &cases);
        assert!(out.simulated);
        assert!(out.output.contains("2 non-empty lines"));
        assert!(out.output.contains("test 1: input=\"2\" expected=\"4\""));
    }
}
