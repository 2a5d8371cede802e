//! Progress store: one record per (learner, experiment).
//!
//! - `get_progress` creates and persists the default record on first read.
//!   Creation happens under the write lock, so concurrent first reads agree on
//!   a single record.
//! - `save_progress` overwrites the completed set and last accessed step
//!   wholesale. There is no merge: the last save wins, even across two open
//!   sessions of the same learner.
//! - Completion is recomputed here from the repository's step count; callers
//!   cannot set it.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{is_complete, ProgressRecord, ProgressSummary, StepNumber};
use crate::error::{require_id, LabError, Result};
use crate::repository::ExperimentRepository;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(&self, learner_id: &str, experiment_id: &str) -> Result<ProgressRecord>;

    async fn save_progress(
        &self,
        learner_id: &str,
        experiment_id: &str,
        completed_steps: &[StepNumber],
        last_accessed_step: StepNumber,
    ) -> Result<ProgressRecord>;

    /// Latest saved summary per experiment for one learner.
    async fn list_progress(&self, learner_id: &str) -> Result<BTreeMap<String, ProgressSummary>>;
}

type RecordKey = (String, String);

pub struct InMemoryProgressStore {
    experiments: Arc<dyn ExperimentRepository>,
    records: RwLock<HashMap<RecordKey, ProgressRecord>>,
}

impl InMemoryProgressStore {
    pub fn new(experiments: Arc<dyn ExperimentRepository>) -> Self {
        Self { experiments, records: RwLock::new(HashMap::new()) }
    }

    /// Number of stored records, for diagnostics.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    #[instrument(level = "debug", skip(self))]
    async fn get_progress(&self, learner_id: &str, experiment_id: &str) -> Result<ProgressRecord> {
        let key = record_key(learner_id, experiment_id)?;

        if let Some(r) = { self.records.read().await.get(&key).cloned() } {
            return Ok(r);
        }

        let mut records = self.records.write().await;
        let mut created = false;
        let record = records
            .entry(key)
            .or_insert_with_key(|(learner, experiment)| {
                created = true;
                ProgressRecord::fresh(learner, experiment)
            })
            .clone();
        if created {
            info!(target: "progress", learner = %record.learner_id, experiment = %record.experiment_id, "Created default progress record");
        }
        Ok(record)
    }

    #[instrument(level = "info", skip(self, completed_steps), fields(completed = completed_steps.len()))]
    async fn save_progress(
        &self,
        learner_id: &str,
        experiment_id: &str,
        completed_steps: &[StepNumber],
        last_accessed_step: StepNumber,
    ) -> Result<ProgressRecord> {
        let key = record_key(learner_id, experiment_id)?;
        let total = self.experiments.get_experiment(&key.1).await?.total_steps();

        let completed: BTreeSet<StepNumber> = completed_steps.iter().copied().collect();
        if let Some(bad) = completed.iter().find(|&&s| s == 0 || s as usize > total) {
            return Err(LabError::invalid(format!(
                "completed step {bad} is outside 1..={total}"
            )));
        }
        if last_accessed_step == 0 || last_accessed_step as usize > total {
            return Err(LabError::invalid(format!(
                "last accessed step {last_accessed_step} is outside 1..={total}"
            )));
        }

        let record = ProgressRecord {
            learner_id: key.0.clone(),
            experiment_id: key.1.clone(),
            is_completed: is_complete(&completed, total),
            completed_steps: completed,
            last_accessed_step,
            last_modified_at: Utc::now(),
        };
        self.records.write().await.insert(key, record.clone());
        debug!(
            target: "progress",
            learner = %record.learner_id,
            experiment = %record.experiment_id,
            completed = record.completed_steps.len(),
            total,
            last = record.last_accessed_step,
            is_completed = record.is_completed,
            "Progress saved"
        );
        Ok(record)
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_progress(&self, learner_id: &str) -> Result<BTreeMap<String, ProgressSummary>> {
        let learner_id = require_id("learnerId", learner_id)?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.learner_id == learner_id)
            .map(|r| (r.experiment_id.clone(), r.summary()))
            .collect())
    }
}

fn record_key(learner_id: &str, experiment_id: &str) -> Result<RecordKey> {
    Ok((
        require_id("learnerId", learner_id)?.to_string(),
        require_id("experimentId", experiment_id)?.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{ExperimentDraft, StepDraft};
    use crate::repository::InMemoryExperimentRepository;

    fn three_step_repo() -> Arc<dyn ExperimentRepository> {
        let e = ExperimentDraft {
            id: Some("exp-1".into()),
            title: "Loops".into(),
            language: "python".into(),
            steps: vec![StepDraft::default(), StepDraft::default(), StepDraft::default()],
            ..Default::default()
        }
        .validate()
        .unwrap();
        Arc::new(InMemoryExperimentRepository::with_experiments([e]))
    }

    #[tokio::test]
    async fn first_read_persists_default_and_second_read_returns_it() {
        let store = InMemoryProgressStore::new(three_step_repo());
        let first = store.get_progress("alice", "exp-1").await.unwrap();
        assert!(first.completed_steps.is_empty());
        assert_eq!(first.last_accessed_step, 1);
        assert!(!first.is_completed);

        let second = store.get_progress("alice", "exp-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_reads_create_exactly_one_record() {
        let store = Arc::new(InMemoryProgressStore::new(three_step_repo()));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let s = store.clone();
                tokio::spawn(async move { s.get_progress("alice", "exp-1").await.unwrap() })
            })
            .collect();
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn save_overwrites_without_merging() {
        let store = InMemoryProgressStore::new(three_step_repo());
        store.save_progress("alice", "exp-1", &[1, 2], 3).await.unwrap();
        let r = store.save_progress("alice", "exp-1", &[1], 2).await.unwrap();
        assert_eq!(r.completed_steps.into_iter().collect::<Vec<_>>(), vec![1]);
        let stored = store.get_progress("alice", "exp-1").await.unwrap();
        assert_eq!(stored.completed_steps.len(), 1);
        assert_eq!(stored.last_accessed_step, 2);
    }

    #[tokio::test]
    async fn completion_is_recomputed_from_step_count() {
        let store = InMemoryProgressStore::new(three_step_repo());
        let r = store.save_progress("alice", "exp-1", &[3, 3, 1], 2).await.unwrap();
        assert!(!r.is_completed);
        let r = store.save_progress("alice", "exp-1", &[2, 1, 3], 3).await.unwrap();
        assert!(r.is_completed);
    }

    #[tokio::test]
    async fn save_rejects_unknown_experiment_and_bad_steps() {
        let store = InMemoryProgressStore::new(three_step_repo());
        assert!(store.save_progress("alice", "gone", &[1], 1).await.unwrap_err().is_not_found());
        assert!(matches!(
            store.save_progress("alice", "exp-1", &[4], 1).await,
            Err(LabError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.save_progress("alice", "exp-1", &[1], 0).await,
            Err(LabError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.save_progress("", "exp-1", &[1], 1).await,
            Err(LabError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn list_is_scoped_to_learner() {
        let store = InMemoryProgressStore::new(three_step_repo());
        store.save_progress("alice", "exp-1", &[1], 2).await.unwrap();
        store.get_progress("bob", "exp-1").await.unwrap();

        let alice = store.list_progress("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice["exp-1"].last_accessed_step, 2);
        assert!(store.list_progress("carol").await.unwrap().is_empty());
    }
}
