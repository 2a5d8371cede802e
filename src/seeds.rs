//! Seed data: a built-in experiment that keeps the app useful without a config bank.

use crate::domain::Experiment;
use crate::draft::{ExperimentDraft, StepDraft, TestCaseDraft};
use crate::error::Result;

pub const SEED_EXPERIMENT_ID: &str = "py-fizzbuzz";

/// Built-in experiments. Bank entries with the same id take precedence.
pub fn seed_experiments() -> Result<Vec<Experiment>> {
  Ok(vec![fizzbuzz()?])
}

fn fizzbuzz() -> Result<Experiment> {
  ExperimentDraft {
    id: Some(SEED_EXPERIMENT_ID.into()),
    title: "FizzBuzz in three steps".into(),
    language: "python".into(),
    description: "Build the classic FizzBuzz one rule at a time.".into(),
    reference_doc_url: Some("https://docs.python.org/3/tutorial/controlflow.html".into()),
    video_url: None,
    steps: vec![
      StepDraft {
        step_number: Some(1),
        title: "Count to n".into(),
        instruction: "Write `count(n)` returning the numbers 1..n as strings.".into(),
        starter_code: "def count(n):\n    pass\n".into(),
        solution_code: "def count(n):\n    return [str(i) for i in range(1, n + 1)]\n".into(),
        test_cases: vec![case("3", "['1', '2', '3']")],
      },
      StepDraft {
        step_number: Some(2),
        title: "Fizz and Buzz".into(),
        instruction: "Replace multiples of 3 with Fizz and multiples of 5 with Buzz.".into(),
        starter_code: "def word(i):\n    pass\n".into(),
        solution_code: "def word(i):\n    if i % 3 == 0:\n        return 'Fizz'\n    if i % 5 == 0:\n        return 'Buzz'\n    return str(i)\n".into(),
        test_cases: vec![case("3", "Fizz"), case("5", "Buzz"), case("7", "7")],
      },
      StepDraft {
        step_number: Some(3),
        title: "FizzBuzz".into(),
        instruction: "Multiples of both 3 and 5 become FizzBuzz; print the whole sequence.".into(),
        starter_code: "def fizzbuzz(n):\n    pass\n".into(),
        solution_code: "def fizzbuzz(n):\n    for i in range(1, n + 1):\n        print('FizzBuzz' if i % 15 == 0 else word(i))\n".into(),
        test_cases: vec![case("15", "...14\nFizzBuzz")],
      },
    ],
  }
  .validate()
}

fn case(input: &str, expected: &str) -> TestCaseDraft {
  TestCaseDraft { input: input.into(), expected_output: expected.into() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seeds_validate() {
    let seeds = seed_experiments().unwrap();
    assert_eq!(seeds[0].id, SEED_EXPERIMENT_ID);
    assert_eq!(seeds[0].total_steps(), 3);
  }
}
