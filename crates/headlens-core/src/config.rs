//! Aggregation settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono_tz::Tz;

/// Default number of concurrent enrichment tasks.
pub const DEFAULT_MAX_WORKERS: NonZeroUsize = NonZeroUsize::MIN.saturating_add(7);

/// Default bound on a single enrichment task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// How enrichment tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// One task at a time, in input order. Useful for tracing.
    Sequential,
    /// All tasks dispatched to a worker pool of at most `max_workers`.
    Pooled {
        /// Upper bound on tasks running at once.
        max_workers: NonZeroUsize,
    },
}

impl ConcurrencyPolicy {
    /// Pooled policy with the given bound, or `None` for zero.
    #[must_use]
    pub fn pooled(max_workers: usize) -> Option<Self> {
        NonZeroUsize::new(max_workers).map(|max_workers| Self::Pooled { max_workers })
    }

    /// Number of tasks that may run at once.
    #[must_use]
    pub const fn parallelism(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pooled { max_workers } => max_workers.get(),
        }
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::Pooled {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Configuration for an [`crate::Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Task scheduling policy.
    pub policy: ConcurrencyPolicy,
    /// Bound on one enrichment task, measured from when it starts running.
    pub task_timeout: Duration,
    /// Timezone timestamps are displayed in.
    pub timezone: Tz,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
            timezone: Tz::UTC,
        }
    }
}

impl AggregatorConfig {
    /// Default configuration for a display timezone.
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            ..Self::default()
        }
    }

    /// Set the scheduling policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-task timeout.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the display timezone.
    #[must_use]
    pub const fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}
