//! Experiment repository: read-mostly storage of validated experiments.
//!
//! Creation and deletion belong to the authoring flow; the progress side only
//! ever reads. Experiments are handed out as `Arc<Experiment>` so every
//! learner session shares one immutable copy.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{Experiment, ExperimentSummary};
use crate::error::{require_id, LabError, Result};

#[async_trait]
pub trait ExperimentRepository: Send + Sync {
    /// Full experiment, solutions included. No redacted view at this layer.
    async fn get_experiment(&self, id: &str) -> Result<Arc<Experiment>>;

    /// Store an experiment, replacing any previous one with the same id as a whole.
    async fn insert_experiment(&self, experiment: Experiment) -> Result<Arc<Experiment>>;

    /// Drop an experiment atomically. Progress records that reference it are left alone.
    async fn delete_experiment(&self, id: &str) -> Result<()>;

    /// Catalogue, sorted by title.
    async fn list_experiments(&self) -> Result<Vec<ExperimentSummary>>;
}

#[derive(Default)]
pub struct InMemoryExperimentRepository {
    by_id: RwLock<HashMap<String, Arc<Experiment>>>,
}

impl InMemoryExperimentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a set of experiments; later entries win on duplicate ids.
    pub fn with_experiments(experiments: impl IntoIterator<Item = Experiment>) -> Self {
        let map = experiments
            .into_iter()
            .map(|e| (e.id.clone(), Arc::new(e)))
            .collect();
        Self { by_id: RwLock::new(map) }
    }
}

#[async_trait]
impl ExperimentRepository for InMemoryExperimentRepository {
    #[instrument(level = "debug", skip(self))]
    async fn get_experiment(&self, id: &str) -> Result<Arc<Experiment>> {
        let id = require_id("experimentId", id)?;
        self.by_id
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LabError::not_found(format!("experiment '{id}'")))
    }

    #[instrument(level = "info", skip(self, experiment), fields(id = %experiment.id, steps = experiment.total_steps()))]
    async fn insert_experiment(&self, experiment: Experiment) -> Result<Arc<Experiment>> {
        let id = require_id("experimentId", &experiment.id)?.to_string();
        let shared = Arc::new(experiment);
        let replaced = self
            .by_id
            .write()
            .await
            .insert(id.clone(), shared.clone())
            .is_some();
        info!(target: "experiment", %id, replaced, "Experiment stored");
        Ok(shared)
    }

    #[instrument(level = "info", skip(self))]
    async fn delete_experiment(&self, id: &str) -> Result<()> {
        let id = require_id("experimentId", id)?;
        match self.by_id.write().await.remove(id) {
            Some(_) => {
                info!(target: "experiment", %id, "Experiment deleted; dependent progress is not cascaded");
                Ok(())
            }
            None => Err(LabError::not_found(format!("experiment '{id}'"))),
        }
    }

    async fn list_experiments(&self) -> Result<Vec<ExperimentSummary>> {
        let by_id = self.by_id.read().await;
        let mut out: Vec<ExperimentSummary> =
            by_id.values().map(|e| ExperimentSummary::from(e.as_ref())).collect();
        out.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        debug!(target: "experiment", count = out.len(), "Listed experiments");
        Ok(out)
    }
}
