//! Async polling client for remote create/poll/fetch job queues
//!
//! Image generation, garment mockups, and print upscales all run against
//! asynchronous remote queues with the same shape: create a job, poll its
//! status, fetch the result once complete. [`JobPoller`] drives that protocol
//! generically over an injected [`JobOperations`] implementation, so the core
//! knows nothing about HTTP, URLs, or any particular vendor.
//!
//! Around the bare protocol the poller layers the policies that make
//! repeated, concurrent UI-triggered calls safe and cheap:
//!
//! * a TTL cache of completed results keyed by [`JobKey`],
//! * in-flight de-duplication so identical concurrent requests share one
//!   remote job (each job has a real monetary or quota cost),
//! * process-wide request pacing and rate-limit cooldowns via a shared
//!   [`RateLimiter`], and
//! * cooperative cancellation checked before every request and transition.

use crate::cache::ResultCache;
use crate::config::PollerConfig;
use crate::ratelimit::{parse_retry_after, RateLimiter};
use crate::types::JobKey;
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Opaque identifier of a created remote job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status reported by a remote queue for an in-progress job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Job is queued or running; keep polling
    Pending,
    /// Job finished; the result can be fetched
    Completed,
    /// Job errored remotely, with the queue's reason
    Failed(String),
}

/// Transport-level error from a [`JobOperations`] implementation
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Request failed outright (network error, non-2xx response, bad payload)
    #[error("{0}")]
    Transport(String),

    /// Remote API rejected the request with a rate limit (HTTP 429)
    ///
    /// `retry_after` carries a structured hint when the API provides one;
    /// otherwise the poller falls back to sniffing the message text.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Error body from the remote API
        message: String,
        /// Structured retry hint, when the API exposes one
        retry_after: Option<Duration>,
    },
}

/// Terminal (non-success) outcome of a [`JobPoller::run_job`] call
///
/// `TimedOut` is deliberately distinct from `Failed`: a queue that never
/// responded warrants different UX messaging than a job the queue explicitly
/// rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    /// The job could not be created
    #[error("job creation failed: {0}")]
    Creation(String),

    /// The remote queue reported the job as failed
    #[error("remote job failed: {0}")]
    Failed(String),

    /// The job never completed within the attempt bound
    #[error("job did not complete within {attempts} poll attempts")]
    TimedOut {
        /// Number of status polls issued before giving up
        attempts: u32,
    },

    /// A rate-limit cooldown window is active; no request was issued
    #[error("remote API cooling down; retry in {}s", .remaining.as_secs())]
    CoolingDown {
        /// Time left until requests may be issued again
        remaining: Duration,
    },

    /// The caller abandoned interest before the job finished
    #[error("job cancelled by caller")]
    Cancelled,
}

/// The create/poll/fetch contract of one remote job kind
///
/// Implementations own all vendor specifics: endpoints, authentication, and
/// payload mapping. Rate-limit responses must surface as
/// [`JobError::RateLimited`] so the poller can open a cooldown window shared
/// by every caller.
#[async_trait]
pub trait JobOperations: Send + Sync {
    /// Caller-supplied job descriptor: enough to create the job and no more
    type Params: Send + Sync;

    /// Completed job result. Cloned into the cache and to de-dup waiters.
    type Output: Clone + Send + Sync + 'static;

    /// Create the remote job, returning its queue identifier
    async fn create(&self, params: &Self::Params) -> Result<JobId, JobError>;

    /// Ask the queue for the job's current status
    async fn poll_status(&self, job: &JobId) -> Result<JobStatus, JobError>;

    /// Fetch the result of a completed job
    async fn fetch_result(&self, job: &JobId) -> Result<Self::Output, JobError>;
}

type JobOutcome<R> = Result<R, PollError>;

enum Role<R> {
    /// This caller drives the remote job and broadcasts the outcome
    Leader(broadcast::Sender<JobOutcome<R>>),
    /// An identical job is already in flight; await its outcome
    Follower(broadcast::Receiver<JobOutcome<R>>),
}

/// Generic polling engine over one remote job kind
///
/// One poller instance is shared per job kind (its cache and in-flight map
/// are keyed by [`JobKey`]); the [`RateLimiter`] is injected so several
/// pollers against the same API key share one pacing state.
pub struct JobPoller<O: JobOperations> {
    ops: O,
    config: PollerConfig,
    limiter: Arc<RateLimiter>,
    cache: ResultCache<O::Output>,
    in_flight: Mutex<HashMap<JobKey, broadcast::Sender<JobOutcome<O::Output>>>>,
}

impl<O: JobOperations> JobPoller<O> {
    /// Create a poller with a validated configuration and a shared limiter
    ///
    /// # Errors
    /// - Invalid poller configuration
    pub fn new(
        ops: O,
        config: PollerConfig,
        limiter: Arc<RateLimiter>,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        let cache = ResultCache::new(config.cache_ttl);
        Ok(Self {
            ops,
            config,
            limiter,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Create a poller with default configuration and its own limiter
    ///
    /// Suitable when the process talks to a single remote queue; otherwise
    /// construct one [`RateLimiter`] per API key and pass it to
    /// [`JobPoller::new`] for each poller sharing that key.
    #[must_use]
    pub fn with_defaults(ops: O) -> Self {
        let config = PollerConfig::default();
        let limiter = Arc::new(RateLimiter::new(config.min_request_gap));
        let cache = ResultCache::new(config.cache_ttl);
        Self {
            ops,
            config,
            limiter,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Access the active configuration
    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Access the injected job operations
    #[must_use]
    pub fn operations(&self) -> &O {
        &self.ops
    }

    /// Run one logical job to completion
    ///
    /// Returns the cached result when a fresh entry exists for `key`. When an
    /// identical job is already in flight, awaits that job's outcome instead
    /// of creating a duplicate. Otherwise creates the remote job and polls it
    /// to a terminal state.
    ///
    /// # Errors
    /// - [`PollError::CoolingDown`] when a rate-limit window is active
    /// - [`PollError::Creation`] when the remote job cannot be created
    /// - [`PollError::Failed`] when the queue reports the job failed
    /// - [`PollError::TimedOut`] when the attempt bound is exhausted
    /// - [`PollError::Cancelled`] when `cancel` fires first
    pub async fn run_job(
        &self,
        key: &JobKey,
        params: &O::Params,
        cancel: &CancellationToken,
    ) -> Result<O::Output, PollError> {
        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            if let Some(hit) = self.cache.get(key) {
                info!("Job {} served from cache", key);
                return Ok(hit);
            }

            let role = {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                match in_flight.entry(key.clone()) {
                    Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
                    Entry::Vacant(slot) => {
                        let (tx, _) = broadcast::channel(1);
                        slot.insert(tx.clone());
                        Role::Leader(tx)
                    },
                }
            };

            match role {
                Role::Follower(mut rx) => {
                    debug!("Job {} already in flight; awaiting shared outcome", key);
                    tokio::select! {
                        () = cancel.cancelled() => return Err(PollError::Cancelled),
                        received = rx.recv() => match received {
                            // A leader cancelled by its own caller resolves
                            // nothing for us; start over as a fresh attempt.
                            Ok(Err(PollError::Cancelled)) | Err(_) => continue,
                            Ok(outcome) => return outcome,
                        },
                    }
                },
                Role::Leader(tx) => {
                    let outcome = self.drive(params, cancel).await;

                    if let Ok(result) = &outcome {
                        self.cache.insert(key.clone(), result.clone());
                        info!("Job {} completed and cached", key);
                    }
                    {
                        let mut in_flight = self
                            .in_flight
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner);
                        in_flight.remove(key);
                    }
                    // Waiters may have gone away; a send error is fine
                    let _ = tx.send(outcome.clone());
                    return outcome;
                },
            }
        }
    }

    /// Drive the create → poll → fetch state machine for one remote job
    async fn drive(
        &self,
        params: &O::Params,
        cancel: &CancellationToken,
    ) -> JobOutcome<O::Output> {
        self.acquire_slot().await?;
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let job = match self.ops.create(params).await {
            Ok(job) => job,
            Err(error) => return Err(self.absorb(error, PollError::Creation).await),
        };
        debug!("Created remote job {}", job);

        for attempt in 1..=self.config.max_attempts {
            tokio::select! {
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                () = tokio::time::sleep(self.config.poll_interval) => {},
            }

            self.acquire_slot().await?;
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            match self.ops.poll_status(&job).await {
                Ok(JobStatus::Completed) => {
                    debug!("Job {} completed after {} poll attempts", job, attempt);
                    return match self.ops.fetch_result(&job).await {
                        Ok(result) => Ok(result),
                        Err(error) => Err(self.absorb(error, PollError::Failed).await),
                    };
                },
                Ok(JobStatus::Failed(reason)) => {
                    warn!("Job {} failed remotely: {}", job, reason);
                    return Err(PollError::Failed(reason));
                },
                Ok(JobStatus::Pending) => {},
                Err(JobError::RateLimited {
                    message,
                    retry_after,
                }) => {
                    return Err(self
                        .absorb(
                            JobError::RateLimited {
                                message,
                                retry_after,
                            },
                            PollError::Failed,
                        )
                        .await)
                },
                // Transient transport errors consume the attempt but keep
                // the loop alive; a dead queue ends in TimedOut, not Failed
                Err(JobError::Transport(message)) => {
                    warn!("Status poll for job {} errored: {}", job, message);
                },
            }
        }

        warn!(
            "Job {} did not complete within {} attempts",
            job, self.config.max_attempts
        );
        Err(PollError::TimedOut {
            attempts: self.config.max_attempts,
        })
    }

    /// Gate one outbound request on the shared limiter
    async fn acquire_slot(&self) -> Result<(), PollError> {
        self.limiter
            .acquire()
            .await
            .map_err(|remaining| PollError::CoolingDown { remaining })
    }

    /// Convert a transport error into a terminal outcome, opening a cooldown
    /// window when the remote signalled a rate limit
    async fn absorb(
        &self,
        error: JobError,
        otherwise: impl FnOnce(String) -> PollError,
    ) -> PollError {
        match error {
            JobError::RateLimited {
                message,
                retry_after,
            } => {
                let cooldown = retry_after
                    .or_else(|| parse_retry_after(&message))
                    .unwrap_or(self.config.default_cooldown);
                self.limiter.note_rate_limited(cooldown).await;
                PollError::CoolingDown {
                    remaining: cooldown,
                }
            },
            JobError::Transport(message) => otherwise(message),
        }
    }
}

impl<O: JobOperations> std::fmt::Debug for JobPoller<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
