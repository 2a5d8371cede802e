//! Application state: the experiment repository, the progress store, and
//! session tuning shared by every handler.
//!
//! Startup order:
//!   - load the TOML config if `LAB_CONFIG_PATH` is set
//!   - validate the config bank, skipping malformed entries
//!   - add built-in seeds whose ids the bank did not claim

use std::{collections::HashMap, sync::Arc};

use tracing::{error, info, instrument};

use crate::config::{load_lab_config_from_env, LabConfig};
use crate::domain::Experiment;
use crate::repository::{ExperimentRepository, InMemoryExperimentRepository};
use crate::seeds::seed_experiments;
use crate::session::SessionSettings;
use crate::store::{InMemoryProgressStore, ProgressStore};

#[derive(Clone)]
pub struct AppState {
    pub experiments: Arc<dyn ExperimentRepository>,
    pub progress: Arc<dyn ProgressStore>,
    pub settings: SessionSettings,
    pub history_limit: usize,
}

impl AppState {
    /// Build state from env: load config, validate the bank, add seeds.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_lab_config_from_env().unwrap_or_default())
    }

    pub fn from_config(cfg: LabConfig) -> Self {
        let mut by_id = HashMap::<String, Experiment>::new();

        for draft in cfg.experiments {
            let label = draft.id.clone().unwrap_or_else(|| draft.title.clone());
            match draft.validate() {
                Ok(e) => {
                    by_id.insert(e.id.clone(), e);
                }
                Err(e) => {
                    error!(target: "experiment", %label, error = %e, "Skipping bank item");
                }
            }
        }
        let bank = by_id.len();

        match seed_experiments() {
            Ok(seeds) => {
                for e in seeds {
                    by_id.entry(e.id.clone()).or_insert(e);
                }
            }
            Err(e) => error!(target: "experiment", error = %e, "Built-in seeds failed validation"),
        }

        info!(target: "experiment", local_bank = bank, total = by_id.len(), "Startup experiment inventory");

        let experiments: Arc<dyn ExperimentRepository> =
            Arc::new(InMemoryExperimentRepository::with_experiments(by_id.into_values()));
        let progress: Arc<dyn ProgressStore> =
            Arc::new(InMemoryProgressStore::new(experiments.clone()));

        Self {
            experiments,
            progress,
            settings: cfg.session.settings(),
            history_limit: cfg.session.history_limit,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(LabConfig::default())
    }
}
