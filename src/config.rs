//! Loading lab configuration (session tuning + optional experiment bank) from TOML.
//!
//! See `LabConfig` for the expected schema:
//!
//! ```toml
//! [session]
//! debounce_ms = 1000
//! history_limit = 50
//!
//! [[experiments]]
//! id = "py-loops"
//! title = "Loops"
//! language = "python"
//! [[experiments.steps]]
//! title = "Count"
//! instruction = "Print 1..3"
//! solution_code = "for i in range(1, 4): print(i)"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, error};

use crate::draft::ExperimentDraft;
use crate::runner::DEFAULT_HISTORY_LIMIT;
use crate::session::{SessionSettings, DEFAULT_DEBOUNCE};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LabConfig {
  #[serde(default)]
  pub session: SessionCfg,
  #[serde(default)]
  pub experiments: Vec<ExperimentDraft>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionCfg {
  /// Quiet period before a progress change is written.
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  /// Simulated runs kept per connection.
  #[serde(default = "default_history_limit")]
  pub history_limit: usize,
}

impl Default for SessionCfg {
  fn default() -> Self {
    Self { debounce_ms: default_debounce_ms(), history_limit: default_history_limit() }
  }
}

impl SessionCfg {
  pub fn settings(&self) -> SessionSettings {
    SessionSettings { debounce: Duration::from_millis(self.debounce_ms) }
  }
}

fn default_debounce_ms() -> u64 { DEFAULT_DEBOUNCE.as_millis() as u64 }
fn default_history_limit() -> usize { DEFAULT_HISTORY_LIMIT }

pub fn parse_lab_config(s: &str) -> Result<LabConfig, toml::de::Error> {
  toml::from_str::<LabConfig>(s)
}

/// Attempt to load `LabConfig` from LAB_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_lab_config_from_env() -> Option<LabConfig> {
  let path = std::env::var("LAB_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_lab_config(&s) {
      Ok(cfg) => {
        info!(target: "codelab_backend", %path, experiments = cfg.experiments.len(), "Loaded lab config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codelab_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "codelab_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_lab_config("").unwrap();
    assert_eq!(cfg.session.debounce_ms, 1000);
    assert_eq!(cfg.session.history_limit, DEFAULT_HISTORY_LIMIT);
    assert!(cfg.experiments.is_empty());
  }

  #[test]
  fn bank_entries_parse_into_drafts() {
    let cfg = parse_lab_config(
      r#"
      [session]
      debounce_ms = 250

      [[experiments]]
      id = "py-loops"
      title = "Loops"
      language = "python"

      [[experiments.steps]]
      title = "Count"
      instruction = "Print 1..3"
      solution_code = "for i in range(1, 4): print(i)"

      [[experiments.steps.test_cases]]
      input = ""
      expected_output = "1\n2\n3"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.session.settings().debounce, Duration::from_millis(250));
    let e = cfg.experiments[0].clone().validate().unwrap();
    assert_eq!(e.id, "py-loops");
    assert_eq!(e.steps()[0].test_cases.len(), 1);
  }
}
