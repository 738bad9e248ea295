//! End-to-end polling workflows against a scripted remote queue
//!
//! Exercises the public poller API the way a storefront backend uses it:
//! repeated mockup requests, racing duplicate requests, rate-limit recovery,
//! and caller-side cancellation. Timing assertions run under tokio's paused
//! clock so they are deterministic.

use async_trait::async_trait;
use designforge::{
    JobError, JobId, JobOperations, JobPoller, JobStatus, MockupRequest, Placement, PollError,
    PollerConfig, RateLimiter,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scripted mockup queue recording every outbound request with a timestamp
struct RecordingQueue {
    creates: AtomicU32,
    polls: AtomicU32,
    request_times: Mutex<Vec<Instant>>,
    pending_polls: u32,
    rate_limit_message: Option<String>,
}

impl RecordingQueue {
    fn completing_after(pending_polls: u32) -> Self {
        Self {
            creates: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            request_times: Mutex::new(Vec::new()),
            pending_polls,
            rate_limit_message: None,
        }
    }

    fn rate_limited_with(message: &str) -> Self {
        Self {
            rate_limit_message: Some(message.to_owned()),
            ..Self::completing_after(0)
        }
    }

    fn stamp(&self) {
        self.request_times.lock().unwrap().push(Instant::now());
    }
}

#[async_trait]
impl JobOperations for RecordingQueue {
    type Params = MockupRequest;
    type Output = String;

    async fn create(&self, params: &MockupRequest) -> Result<JobId, JobError> {
        self.stamp();
        if let Some(message) = &self.rate_limit_message {
            return Err(JobError::RateLimited {
                message: message.clone(),
                retry_after: None,
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(JobId(format!("task-{}-{}", params.product_id, params.variant_id)))
    }

    async fn poll_status(&self, _job: &JobId) -> Result<JobStatus, JobError> {
        self.stamp();
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        if seen < self.pending_polls {
            Ok(JobStatus::Pending)
        } else {
            Ok(JobStatus::Completed)
        }
    }

    async fn fetch_result(&self, job: &JobId) -> Result<String, JobError> {
        Ok(format!("https://mockups.example.com/{job}.jpg"))
    }
}

fn request(variant_id: u64) -> MockupRequest {
    MockupRequest {
        product_id: 71,
        variant_id,
        design_url: "https://cdn.example.com/designs/abc.png".to_owned(),
        placement: Placement {
            scale: 20.2,
            y_offset: -0.3,
        },
    }
}

fn fast_config() -> PollerConfig {
    PollerConfig::builder()
        .max_attempts(6)
        .poll_interval(Duration::from_millis(200))
        .min_request_gap(Duration::from_millis(2500))
        .cache_ttl(Duration::from_secs(900))
        .build()
        .unwrap()
}

fn poller(queue: RecordingQueue, config: PollerConfig) -> JobPoller<RecordingQueue> {
    let limiter = Arc::new(RateLimiter::new(config.min_request_gap));
    JobPoller::new(queue, config, limiter).unwrap()
}

#[tokio::test(start_paused = true)]
async fn repeat_request_within_ttl_issues_one_remote_job() {
    let poller = poller(RecordingQueue::completing_after(1), fast_config());
    let cancel = CancellationToken::new();

    let req = request(4012);
    let first = poller
        .run_job(&req.job_key(), &req, &cancel)
        .await
        .unwrap();

    // Same variant with sub-integer placement jitter: identical job key
    let mut jittered = request(4012);
    jittered.placement.scale = 19.8;
    let second = poller
        .run_job(&jittered.job_key(), &jittered, &cancel)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(poller_creates(&poller), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_cache_entry_triggers_fresh_creation() {
    let config = PollerConfig::builder()
        .max_attempts(6)
        .poll_interval(Duration::from_millis(200))
        .min_request_gap(Duration::from_millis(10))
        .cache_ttl(Duration::from_secs(5))
        .build()
        .unwrap();
    let poller = poller(RecordingQueue::completing_after(0), config);
    let cancel = CancellationToken::new();
    let req = request(4012);

    poller.run_job(&req.job_key(), &req, &cancel).await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    poller.run_job(&req.job_key(), &req, &cancel).await.unwrap();

    assert_eq!(poller_creates(&poller), 2);
}

#[tokio::test(start_paused = true)]
async fn cooldown_blocks_requests_until_window_elapses() {
    let poller = poller(
        RecordingQueue::rate_limited_with("Rate limit exceeded, retry after 5 seconds"),
        fast_config(),
    );
    let cancel = CancellationToken::new();
    let req = request(4012);

    let outcome = poller.run_job(&req.job_key(), &req, &cancel).await;
    assert_eq!(
        outcome,
        Err(PollError::CoolingDown {
            remaining: Duration::from_secs(5)
        })
    );

    // Within the window every call fails fast without touching the network
    let requests_before = poller_request_count(&poller);
    let other = request(9999);
    let outcome = poller.run_job(&other.job_key(), &other, &cancel).await;
    assert!(matches!(outcome, Err(PollError::CoolingDown { .. })));
    assert_eq!(poller_request_count(&poller), requests_before);
}

#[tokio::test(start_paused = true)]
async fn outbound_requests_respect_minimum_spacing() {
    let poller = Arc::new(poller(RecordingQueue::completing_after(1), fast_config()));
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    for variant in [4012u64, 4013] {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            let req = request(variant);
            poller.run_job(&req.job_key(), &req, &cancel).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut stamps = poller_request_times(&poller);
    stamps.sort();
    assert!(stamps.len() >= 4);
    for pair in stamps.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(2500),
            "outbound requests closer than the minimum gap"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn racing_identical_requests_share_one_remote_job() {
    let poller = Arc::new(poller(RecordingQueue::completing_after(2), fast_config()));
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            let req = request(4012);
            poller.run_job(&req.job_key(), &req, &cancel).await
        }));
    }

    let mut urls = Vec::new();
    for task in tasks {
        urls.push(task.await.unwrap().unwrap());
    }
    assert!(urls.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(poller_creates(&poller), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_stops_issuing_requests() {
    let poller = Arc::new(poller(
        RecordingQueue::completing_after(u32::MAX),
        fast_config(),
    ));
    let cancel = CancellationToken::new();

    let task = {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let req = request(4012);
            poller.run_job(&req.job_key(), &req, &cancel).await
        })
    };

    tokio::time::sleep(Duration::from_secs(8)).await;
    let requests_before = poller_request_count(&poller);
    cancel.cancel();
    let outcome = task.await.unwrap();

    assert_eq!(outcome, Err(PollError::Cancelled));
    assert_eq!(poller_request_count(&poller), requests_before);
}

#[tokio::test(start_paused = true)]
async fn data_url_designs_are_rejected_before_any_network() {
    let req = MockupRequest {
        design_url: "data:image/png;base64,AAAA".to_owned(),
        ..request(4012)
    };
    assert!(req.validate().is_err());
}

// Accessor helpers: the queue lives inside the poller, so reach its counters
// through small wrappers to keep the tests readable.

fn poller_creates(poller: &JobPoller<RecordingQueue>) -> u32 {
    poller.operations().creates.load(Ordering::SeqCst)
}

fn poller_request_count(poller: &JobPoller<RecordingQueue>) -> usize {
    poller.operations().request_times.lock().unwrap().len()
}

fn poller_request_times(poller: &JobPoller<RecordingQueue>) -> Vec<Instant> {
    poller.operations().request_times.lock().unwrap().clone()
}
