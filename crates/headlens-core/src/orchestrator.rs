//! Concurrent aggregation orchestrator.
//!
//! Fans out one enrichment task per entity, waits for every task to
//! finish (or time out), and returns one [`Slot`] per input entity in
//! input order. Completion order never affects the output.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use headlens_api::{HeadscaleApi, Machine, User};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::{AggregatorConfig, ConcurrencyPolicy};
use crate::error::{AggregateError, AggregateResult, EnrichError};
use crate::overview::{OverviewCounts, collect_overview};
use crate::pool::WorkerPool;
use crate::slot::Slot;
use crate::task::{enrich_machine, enrich_user, machine_label, user_label};
use crate::time::PassClock;
use crate::view::{MachineView, UserKeys};

/// Builds view models from a headscale API.
#[derive(Debug)]
pub struct Aggregator<A> {
    api: Arc<A>,
    config: AggregatorConfig,
    pool: Option<WorkerPool>,
}

impl<A: HeadscaleApi + 'static> Aggregator<A> {
    /// Create an aggregator. A pooled policy gets its own worker pool,
    /// which lives as long as the aggregator.
    pub fn new(api: Arc<A>, config: AggregatorConfig) -> Self {
        let pool = match config.policy {
            ConcurrencyPolicy::Sequential => None,
            ConcurrencyPolicy::Pooled { max_workers } => Some(WorkerPool::new(max_workers)),
        };
        Self { api, config, pool }
    }

    /// Create an aggregator that dispatches onto an existing pool.
    ///
    /// The pool's size takes precedence over `max_workers` in a pooled
    /// policy. A sequential policy ignores the pool.
    pub fn with_pool(api: Arc<A>, config: AggregatorConfig, pool: WorkerPool) -> Self {
        let pool = match config.policy {
            ConcurrencyPolicy::Sequential => None,
            ConcurrencyPolicy::Pooled { .. } => Some(pool),
        };
        Self { api, config, pool }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Capture the clock for a new pass.
    pub fn clock(&self) -> PassClock {
        PassClock::capture(self.config.timezone)
    }

    /// Machine cards, one slot per machine in API order.
    pub async fn machine_views(&self) -> AggregateResult<Vec<Slot<MachineView>>> {
        self.machine_views_at(self.clock()).await
    }

    /// Machine cards against a given clock.
    pub async fn machine_views_at(
        &self,
        clock: PassClock,
    ) -> AggregateResult<Vec<Slot<MachineView>>> {
        info!("Rendering machine views");
        let machines = self
            .api
            .get_machines()
            .await
            .map_err(|e| AggregateError::api("machines", e))?;
        self.enrich_machines(machines, clock).await
    }

    /// Enrich an already fetched machine list.
    pub async fn enrich_machines(
        &self,
        machines: Vec<Machine>,
        clock: PassClock,
    ) -> AggregateResult<Vec<Slot<MachineView>>> {
        self.fan_out("machines", machines, machine_label, clock, |api, machine, clock| async move {
            enrich_machine(&*api, &machine, &clock).await
        })
        .await
    }

    /// Pre-auth key tables, one slot per user in API order.
    pub async fn user_keys(&self) -> AggregateResult<Vec<Slot<UserKeys>>> {
        self.user_keys_at(self.clock()).await
    }

    /// Pre-auth key tables against a given clock.
    pub async fn user_keys_at(&self, clock: PassClock) -> AggregateResult<Vec<Slot<UserKeys>>> {
        info!("Rendering user key tables");
        let users = self
            .api
            .get_users()
            .await
            .map_err(|e| AggregateError::api("users", e))?;
        self.enrich_users(users, clock).await
    }

    /// Enrich an already fetched user list.
    pub async fn enrich_users(
        &self,
        users: Vec<User>,
        clock: PassClock,
    ) -> AggregateResult<Vec<Slot<UserKeys>>> {
        self.fan_out("users", users, user_label, clock, |api, user, clock| async move {
            enrich_user(&*api, &user, &clock).await
        })
        .await
    }

    /// Server-wide counters.
    pub async fn overview(&self) -> AggregateResult<OverviewCounts> {
        self.overview_at(self.clock()).await
    }

    /// Server-wide counters against a given clock.
    pub async fn overview_at(&self, clock: PassClock) -> AggregateResult<OverviewCounts> {
        info!("Rendering overview");
        collect_overview(&*self.api, &clock).await
    }

    async fn fan_out<E, T, F, Fut>(
        &self,
        what: &'static str,
        entities: Vec<E>,
        label: fn(&E) -> String,
        clock: PassClock,
        task: F,
    ) -> AggregateResult<Vec<Slot<T>>>
    where
        E: Send + 'static,
        T: Send + 'static,
        F: Fn(Arc<A>, E, PassClock) -> Fut,
        Fut: Future<Output = Result<T, EnrichError>> + Send + 'static,
    {
        let total = entities.len();
        let labels: Vec<String> = entities.iter().map(label).collect();
        let timeout = self.config.task_timeout;

        let outcomes = match &self.pool {
            None => {
                info!(what, total, "Enriching sequentially");
                run_sequential(timeout, entities, |entity| {
                    task(Arc::clone(&self.api), entity, clock)
                })
                .await
            }
            Some(pool) => {
                info!(what, total, workers = pool.size(), "Starting pooled enrichment");
                let outcomes = run_pooled(pool, timeout, entities, |entity| {
                    task(Arc::clone(&self.api), entity, clock)
                })
                .await;
                info!(what, total, "Finished pooled enrichment");
                outcomes
            }
        };

        let slots: Vec<Slot<T>> = outcomes
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (outcome, label))| {
                if let Err(err) = &outcome {
                    warn!(what, index, entity = %label, error = %err, "Degraded slot");
                }
                Slot::from_outcome(index, label, outcome)
            })
            .collect();

        if total > 0 && slots.iter().all(|s| !s.is_ready()) {
            let first = slots
                .iter()
                .find_map(Slot::failure)
                .map(|f| f.message.clone())
                .unwrap_or_default();
            return Err(AggregateError::AllFailed { what, total, first });
        }
        Ok(slots)
    }
}

/// Run `fut` with a deadline starting now.
async fn bounded<T, Fut>(timeout: Duration, fut: Fut) -> Result<T, EnrichError>
where
    Fut: Future<Output = Result<T, EnrichError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(EnrichError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }))
}

/// Run one task at a time, in input order.
///
/// Each task still runs on its own tokio task, so a panic degrades that
/// entity exactly as it would in the pool.
async fn run_sequential<E, T, Fut>(
    timeout: Duration,
    entities: Vec<E>,
    mut make_task: impl FnMut(E) -> Fut,
) -> Vec<Result<T, EnrichError>>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, EnrichError>> + Send + 'static,
{
    let mut outcomes = Vec::with_capacity(entities.len());
    for (index, entity) in entities.into_iter().enumerate() {
        let fut = make_task(entity);
        let joined = tokio::spawn(bounded(timeout, fut)).await;
        let outcome = flatten_join(joined.map(Some));
        debug!(index, ok = outcome.is_ok(), "Finished task");
        outcomes.push(outcome);
    }
    outcomes
}

/// Dispatch every entity to the pool and wait for all of them.
///
/// Each task writes its outcome into the slot reserved for its input
/// index as it completes.
async fn run_pooled<E, T, Fut>(
    pool: &WorkerPool,
    timeout: Duration,
    entities: Vec<E>,
    mut make_task: impl FnMut(E) -> Fut,
) -> Vec<Result<T, EnrichError>>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, EnrichError>> + Send + 'static,
{
    let mut slots: Vec<Option<Result<T, EnrichError>>> =
        std::iter::repeat_with(|| None).take(entities.len()).collect();

    let mut pending: FuturesUnordered<_> = entities
        .into_iter()
        .enumerate()
        .map(|(index, entity)| {
            let fut = make_task(entity);
            let handle = pool.spawn(async move { bounded(timeout, fut).await });
            async move { (index, handle.await) }
        })
        .collect();

    while let Some((index, joined)) = pending.next().await {
        debug!(index, "Task completed");
        slots[index] = Some(flatten_join(joined));
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(EnrichError::Cancelled)))
        .collect()
}

fn flatten_join<T>(
    joined: Result<Option<Result<T, EnrichError>>, JoinError>,
) -> Result<T, EnrichError> {
    match joined {
        Ok(Some(outcome)) => outcome,
        Ok(None) => Err(EnrichError::Cancelled),
        Err(err) if err.is_panic() => {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EnrichError::Panicked { message })
        }
        Err(_) => Err(EnrichError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    #[tokio::test(start_paused = true)]
    async fn test_run_pooled_keeps_input_order() {
        let pool = WorkerPool::new(NonZeroUsize::new(4).unwrap());
        let delays = vec![40u64, 10, 30, 20];

        let outcomes = run_pooled(&pool, Duration::from_secs(1), delays, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, EnrichError>(delay)
        })
        .await;

        let values: Vec<u64> = outcomes.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![40, 10, 30, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pooled_times_out_slow_task() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap());

        let slow = |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, EnrichError>(delay)
        };
        let outcomes = run_pooled(&pool, Duration::from_millis(50), vec![10u64, 500], slow).await;

        assert_eq!(outcomes[0], Ok(10));
        assert_eq!(outcomes[1], Err(EnrichError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_run_pooled_isolates_panics() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap());

        let outcomes = run_pooled(&pool, Duration::from_secs(1), vec![1u32, 2, 3], |n| async move {
            assert!(n != 2, "task two exploded");
            Ok::<_, EnrichError>(n)
        })
        .await;

        assert_eq!(outcomes[0], Ok(1));
        assert!(matches!(
            &outcomes[1],
            Err(EnrichError::Panicked { message }) if message.contains("task two exploded")
        ));
        assert_eq!(outcomes[2], Ok(3));
    }

    #[tokio::test]
    async fn test_run_sequential_isolates_panics() {
        let outcomes = run_sequential(Duration::from_secs(1), vec![1u32, 2, 3], |n| async move {
            assert!(n != 2, "task two exploded");
            Ok::<_, EnrichError>(n)
        })
        .await;

        assert_eq!(outcomes[0], Ok(1));
        assert!(matches!(
            &outcomes[1],
            Err(EnrichError::Panicked { message }) if message.contains("task two exploded")
        ));
        assert_eq!(outcomes[2], Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sequential_times_out_slow_task() {
        let slow = |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, EnrichError>(delay)
        };
        let outcomes = run_sequential(Duration::from_millis(50), vec![500u64, 10], slow).await;

        assert_eq!(outcomes[0], Err(EnrichError::Timeout { timeout_ms: 50 }));
        assert_eq!(outcomes[1], Ok(10));
    }

    #[tokio::test]
    async fn test_run_pooled_closed_pool() {
        let pool = WorkerPool::new(NonZeroUsize::new(1).unwrap());
        pool.close();

        let outcomes =
            run_pooled(&pool, Duration::from_secs(1), vec![1u32], |n| async move { Ok(n) }).await;
        assert_eq!(outcomes, vec![Err(EnrichError::Cancelled)]);
    }
}
