use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::TtlCache;
use crate::db::CallDataStore;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::CategoryAggregates;
use crate::periods::DateRange;

/// One (client, window) fetch.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub client: String,
    pub range: DateRange,
}

/// Outcome of a fan-out batch. `results` is index-aligned with the submitted
/// tasks; a failed task holds zeroed aggregates at its slot.
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<CategoryAggregates>,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_in_flight: usize,
    pub task_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_in_flight: 5,
            task_timeout: Duration::from_secs(20),
        }
    }
}

impl OrchestratorConfig {
    /// Denser profile for scorecard runs, which fan out five windows per
    /// client across the whole book of clients in one batch.
    pub fn scorecard() -> Self {
        OrchestratorConfig {
            max_in_flight: 30,
            task_timeout: Duration::from_secs(45),
        }
    }
}

pub type AggregateCache = TtlCache<(String, i64, i64), CategoryAggregates>;

/// Runs (client, window) fetches against the store with bounded concurrency.
///
/// A single failed or timed-out task is downgraded to zeroed aggregates and
/// a warning so one bad window cannot sink a whole report; only a batch in
/// which every task failed comes back as `StoreUnavailable`.
pub struct FetchOrchestrator<S> {
    store: Arc<S>,
    config: OrchestratorConfig,
    cache: Option<Arc<AggregateCache>>,
}

fn cache_key(task: &FetchTask) -> (String, i64, i64) {
    (
        task.client.clone(),
        task.range.start.timestamp_millis(),
        task.range.end.timestamp_millis(),
    )
}

impl<S> FetchOrchestrator<S>
where
    S: CallDataStore + 'static,
{
    pub fn new(store: Arc<S>, config: OrchestratorConfig) -> Self {
        FetchOrchestrator {
            store,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<AggregateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn list_clients(&self) -> AnalyticsResult<Vec<String>> {
        self.store.list_clients().await
    }

    pub async fn fetch_batch(&self, tasks: Vec<FetchTask>) -> AnalyticsResult<BatchResult> {
        let task_count = tasks.len();
        if task_count == 0 {
            return Ok(BatchResult {
                results: Vec::new(),
                failed: 0,
            });
        }
        if let Some(cache) = &self.cache {
            cache.purge_expired();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let cache = self.cache.clone();
            let task_timeout = self.config.task_timeout;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            task,
                            Err(AnalyticsError::Store("fetch queue closed".to_string())),
                        )
                    }
                };

                let key = cache_key(&task);
                if let Some(cache) = cache.as_deref() {
                    if let Some(hit) = cache.get(&key) {
                        return (index, task, Ok(hit));
                    }
                }

                let outcome = match tokio::time::timeout(
                    task_timeout,
                    store.fetch_raw_aggregates(&task.client, &task.range),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AnalyticsError::Store(format!(
                        "fetch timed out after {task_timeout:?}"
                    ))),
                };

                if let (Some(cache), Ok(aggregates)) = (cache.as_deref(), &outcome) {
                    cache.insert(key, aggregates.clone());
                }
                (index, task, outcome)
            });
        }

        let mut results = vec![CategoryAggregates::zero(); task_count];
        let mut failed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, _, Ok(aggregates))) => results[index] = aggregates,
                Ok((_, task, Err(err))) => {
                    failed += 1;
                    tracing::warn!(
                        client = %task.client,
                        window = %task.range.label,
                        error = %err,
                        "aggregate fetch failed, contributing zeroes"
                    );
                }
                Err(join_err) => {
                    failed += 1;
                    tracing::warn!(error = %join_err, "aggregate fetch task aborted");
                }
            }
        }

        if failed == task_count {
            return Err(AnalyticsError::StoreUnavailable { failed });
        }
        tracing::debug!(tasks = task_count, failed, "fetch batch complete");
        Ok(BatchResult { results, failed })
    }

    /// Fetch one window for every client and fold the results into a single
    /// aggregate. Fold order does not matter, so arrival order does not
    /// either.
    pub async fn fetch_window_totals(
        &self,
        clients: &[String],
        range: &DateRange,
    ) -> AnalyticsResult<CategoryAggregates> {
        let tasks = clients
            .iter()
            .map(|client| FetchTask {
                client: client.clone(),
                range: range.clone(),
            })
            .collect();
        let batch = self.fetch_batch(tasks).await?;
        if batch.failed > 0 {
            tracing::info!(
                window = %range.label,
                failed = batch.failed,
                "window totals computed from partial data"
            );
        }
        Ok(CategoryAggregates::sum(&batch.results))
    }

    /// Fetch several windows for the same client set, returning one summed
    /// aggregate per window (window order preserved).
    pub async fn fetch_per_window_totals(
        &self,
        clients: &[String],
        windows: &[DateRange],
    ) -> AnalyticsResult<Vec<CategoryAggregates>> {
        if clients.is_empty() || windows.is_empty() {
            return Ok(vec![CategoryAggregates::zero(); windows.len()]);
        }

        let tasks = windows
            .iter()
            .flat_map(|window| {
                clients.iter().map(|client| FetchTask {
                    client: client.clone(),
                    range: window.clone(),
                })
            })
            .collect();
        let batch = self.fetch_batch(tasks).await?;
        if batch.failed > 0 {
            tracing::info!(
                windows = windows.len(),
                failed = batch.failed,
                "per-window totals computed from partial data"
            );
        }
        Ok(batch
            .results
            .chunks(clients.len())
            .map(|window| CategoryAggregates::sum(window))
            .collect())
    }
}
