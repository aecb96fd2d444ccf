//! Fixed-interval polling of submitted jobs.
//!
//! [`PollConfig`] bounds how long a stage may wait for its job: the poller
//! sleeps `interval` before every status check and gives up after
//! `max_attempts` checks. Each check is itself capped at `check_timeout`,
//! so a hung provider cannot stretch a stage past
//! `(interval + check_timeout) * max_attempts`. Use [`PollConfig::image()`] and [`PollConfig::video()`]
//! for the two pipeline stages.

use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{primary_output, Endpoint, JobClient, JobHandle, JobStatus};
use crate::error::PollError;
use crate::types::StageResult;

/// Type alias for the callback invoked after each status check.
///
/// Arguments: `(attempt_number, observed_status)`; attempts are 1-indexed.
pub type AttemptCallback<'a> = Option<&'a mut (dyn FnMut(u32, &JobStatus) + Send)>;

/// Polling budget for one stage.
///
/// # Example
///
/// ```
/// use video_pipeline::poll::PollConfig;
/// use std::time::Duration;
///
/// let image = PollConfig::image();
/// assert_eq!(image.budget(), Duration::from_secs(90));
///
/// let video = PollConfig::video();
/// assert_eq!(video.budget(), Duration::from_secs(180));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status check. Default: 2 seconds.
    pub interval: Duration,

    /// Maximum number of status checks before timing out.
    pub max_attempts: u32,

    /// Upper bound on a single status check. A check that takes longer
    /// counts as `Processing`. Default: same as `interval`.
    pub check_timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            check_timeout: interval,
        }
    }

    /// Override the per-check cap.
    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    /// Image stage: 2s interval, 45 attempts (90s).
    pub fn image() -> Self {
        Self::new(Duration::from_secs(2), 45)
    }

    /// Video stage: 2s interval, 90 attempts (180s).
    pub fn video() -> Self {
        Self::new(Duration::from_secs(2), 90)
    }

    /// Time spent sleeping between checks: `interval * max_attempts`.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Worst-case wall-clock time, counting checks that hit `check_timeout`.
    pub fn max_elapsed(&self) -> Duration {
        (self.interval + self.check_timeout) * self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::image()
    }
}

/// Poll `handle` until it reaches a terminal status or the budget runs out.
///
/// Sleeps `config.interval` before every check. A `Succeeded` status returns
/// its primary output immediately, a `Failed` status returns
/// [`PollError::Failed`] immediately, anything else consumes one attempt.
/// A failed status fetch comes back from the client as `Processing` and is
/// counted like any other in-progress answer. So is a check that does not
/// answer within `config.check_timeout`, which keeps a hanging provider from
/// holding the stage for the full HTTP client timeout on every attempt.
///
/// # Arguments
///
/// * `backend`: The job client to query
/// * `client`: HTTP client for making requests
/// * `endpoint`: Provider base URL and credential
/// * `handle`: The job to wait for
/// * `config`: Interval and attempt cap
/// * `on_attempt`: Optional callback invoked after each check with (attempt, status)
pub async fn wait(
    backend: &dyn JobClient,
    client: &Client,
    endpoint: &Endpoint<'_>,
    handle: &JobHandle,
    config: &PollConfig,
    mut on_attempt: AttemptCallback<'_>,
) -> Result<StageResult, PollError> {
    let started = Instant::now();

    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.interval).await;

        let status = match tokio::time::timeout(
            config.check_timeout,
            backend.poll(client, endpoint, handle),
        )
        .await
        {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    job_id = %handle.id,
                    attempt,
                    timeout_ms = config.check_timeout.as_millis() as u64,
                    "status check timed out, treating job as still processing"
                );
                JobStatus::Processing
            }
        };
        debug!(job_id = %handle.id, attempt, status = status.label(), "polled job");

        if let Some(ref mut cb) = on_attempt {
            cb(attempt, &status);
        }

        match status {
            JobStatus::Succeeded(output) => {
                return primary_output(&output)
                    .map(|primary_output| StageResult { primary_output })
                    .ok_or_else(|| {
                        PollError::Failed(format!(
                            "job {} succeeded but returned no output",
                            handle.id
                        ))
                    });
            }
            JobStatus::Failed(message) => return Err(PollError::Failed(message)),
            JobStatus::Starting | JobStatus::Processing => continue,
        }
    }

    Err(PollError::Timeout {
        attempts: config.max_attempts,
        elapsed: started.elapsed(),
    })
}
