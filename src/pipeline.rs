//! Two-stage image → video pipeline.
//!
//! The run is an explicit state machine. [`PipelineState::transition`] is a
//! pure function from `(state, StageEvent)` to the next state; the driver in
//! [`StagePipeline`] performs the side effect belonging to the current state
//! (submit or poll) and feeds the resulting event back in until a terminal
//! state is reached.
//!
//! ```text
//! NotStarted ─submit─► ImageSubmitted ─► ImagePolling ─poll─► ImageReady
//!                                                                 │
//!        VideoReady ◄─poll─ VideoPolling ◄─ VideoSubmitted ◄─submit┘
//!
//! any submit/poll failure ─► Failed(stage) | TimedOut(stage)
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    backend::{Endpoint, JobHandle, JobStatus},
    events::{emit, Event},
    exec_ctx::ExecCtx,
    poll,
    stage::{Stage, StageKind},
    types::{PipelineOutcome, StageResult},
    PipelineError, PollError,
};

/// Why a stage ended in [`PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider rejected job creation.
    Submit(String),
    /// The provider reported the job as failed.
    Job(String),
    /// Transport failure, undecodable response or an impossible transition.
    Unexpected(String),
}

/// Result of performing one state's side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// The provider accepted the job.
    Submitted(JobHandle),
    /// The provider answered job creation with a non-success status.
    SubmitRejected(String),
    /// Job creation failed for any other reason.
    SubmitErrored(String),
    /// Polling has begun for the submitted job.
    PollingStarted,
    /// The job succeeded.
    Completed(StageResult),
    /// The job failed.
    JobFailed(String),
    /// The polling budget ran out.
    TimedOut(Duration),
}

/// Where a pipeline run currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    NotStarted,
    ImageSubmitted { handle: JobHandle },
    ImagePolling { handle: JobHandle },
    ImageReady { image_url: String },
    VideoSubmitted { image_url: String, handle: JobHandle },
    VideoPolling { image_url: String, handle: JobHandle },
    VideoReady { image_url: String, video_url: String },
    Failed { stage: StageKind, reason: FailureReason },
    TimedOut { stage: StageKind, elapsed: Duration },
}

impl PipelineState {
    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::VideoReady { .. } | Self::Failed { .. } | Self::TimedOut { .. }
        )
    }

    /// The stage this state belongs to.
    pub fn stage(&self) -> StageKind {
        match self {
            Self::NotStarted
            | Self::ImageSubmitted { .. }
            | Self::ImagePolling { .. }
            | Self::ImageReady { .. } => StageKind::Image,
            Self::VideoSubmitted { .. } | Self::VideoPolling { .. } | Self::VideoReady { .. } => {
                StageKind::Video
            }
            Self::Failed { stage, .. } | Self::TimedOut { stage, .. } => *stage,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ImageSubmitted { .. } => "image_submitted",
            Self::ImagePolling { .. } => "image_polling",
            Self::ImageReady { .. } => "image_ready",
            Self::VideoSubmitted { .. } => "video_submitted",
            Self::VideoPolling { .. } => "video_polling",
            Self::VideoReady { .. } => "video_ready",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }

    /// Compute the next state. Terminal states absorb every event.
    pub fn transition(self, event: StageEvent) -> PipelineState {
        use PipelineState as S;
        use StageEvent as E;

        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (S::NotStarted, E::Submitted(handle)) => S::ImageSubmitted { handle },
            (S::ImageReady { image_url }, E::Submitted(handle)) => {
                S::VideoSubmitted { image_url, handle }
            }

            (state @ (S::NotStarted | S::ImageReady { .. }), E::SubmitRejected(detail)) => {
                S::Failed {
                    stage: state.next_submission(),
                    reason: FailureReason::Submit(detail),
                }
            }
            (state @ (S::NotStarted | S::ImageReady { .. }), E::SubmitErrored(detail)) => {
                S::Failed {
                    stage: state.next_submission(),
                    reason: FailureReason::Unexpected(detail),
                }
            }

            (S::ImageSubmitted { handle }, E::PollingStarted) => S::ImagePolling { handle },
            (S::VideoSubmitted { image_url, handle }, E::PollingStarted) => {
                S::VideoPolling { image_url, handle }
            }

            (S::ImagePolling { .. }, E::Completed(result)) => S::ImageReady {
                image_url: result.primary_output,
            },
            (S::VideoPolling { image_url, .. }, E::Completed(result)) => S::VideoReady {
                image_url,
                video_url: result.primary_output,
            },

            (state @ (S::ImagePolling { .. } | S::VideoPolling { .. }), E::JobFailed(detail)) => {
                S::Failed {
                    stage: state.stage(),
                    reason: FailureReason::Job(detail),
                }
            }
            (state @ (S::ImagePolling { .. } | S::VideoPolling { .. }), E::TimedOut(elapsed)) => {
                S::TimedOut {
                    stage: state.stage(),
                    elapsed,
                }
            }

            (state, event) => S::Failed {
                stage: state.stage(),
                reason: FailureReason::Unexpected(format!(
                    "invalid transition from {} on {:?}",
                    state.name(),
                    event
                )),
            },
        }
    }

    /// Which stage the next submission from this state belongs to.
    fn next_submission(&self) -> StageKind {
        match self {
            Self::ImageReady { .. } => StageKind::Video,
            _ => StageKind::Image,
        }
    }

    /// Convert a terminal state into the run's outcome.
    pub fn into_outcome(self) -> PipelineOutcome {
        match self {
            Self::VideoReady {
                image_url,
                video_url,
            } => PipelineOutcome::Success {
                image_url,
                video_url,
            },
            Self::Failed {
                stage,
                reason: FailureReason::Submit(detail),
            } => PipelineOutcome::UpstreamSubmitError { stage, detail },
            Self::Failed {
                stage,
                reason: FailureReason::Job(detail),
            } => PipelineOutcome::UpstreamFailure { stage, detail },
            Self::Failed {
                reason: FailureReason::Unexpected(detail),
                ..
            } => PipelineOutcome::UnexpectedError { detail },
            Self::TimedOut { stage, elapsed } => PipelineOutcome::UpstreamTimeout { stage, elapsed },
            other => PipelineOutcome::UnexpectedError {
                detail: format!("pipeline stopped in non-terminal state {}", other.name()),
            },
        }
    }
}

/// Sequences the image stage and the video stage.
///
/// Holds no per-run state; one instance can serve any number of concurrent
/// runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePipeline {
    image: Stage,
    video: Stage,
}

impl Default for StagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl StagePipeline {
    /// Image and video stages with their default budgets.
    pub fn new() -> Self {
        Self {
            image: Stage::image(),
            video: Stage::video(),
        }
    }

    /// Replace the image stage.
    pub fn with_image_stage(mut self, stage: Stage) -> Self {
        self.image = stage;
        self
    }

    /// Replace the video stage.
    pub fn with_video_stage(mut self, stage: Stage) -> Self {
        self.video = stage;
        self
    }

    fn stage(&self, kind: StageKind) -> &Stage {
        match kind {
            StageKind::Image => &self.image,
            StageKind::Video => &self.video,
        }
    }

    /// Run both stages for `task_description`, resolving the credential from `ctx`.
    pub async fn run(&self, ctx: &ExecCtx, task_description: &str) -> PipelineOutcome {
        match ctx.api_token() {
            Some(token) => self.run_with_token(ctx, &token, task_description).await,
            None => PipelineOutcome::ConfigurationError {
                message: "provider API token is not configured".to_string(),
            },
        }
    }

    /// Run both stages with an already-resolved credential.
    pub async fn run_with_token(
        &self,
        ctx: &ExecCtx,
        api_token: &str,
        task_description: &str,
    ) -> PipelineOutcome {
        let endpoint = Endpoint {
            base_url: &ctx.base_url,
            api_token,
        };

        let mut state = PipelineState::NotStarted;
        while !state.is_terminal() {
            let event = self.step(ctx, &endpoint, &state, task_description).await;
            state = state.transition(event);
            debug!(state = state.name(), "pipeline transition");
            self.observe(ctx, &state);
        }
        state.into_outcome()
    }

    /// Perform the side effect belonging to `state`.
    async fn step(
        &self,
        ctx: &ExecCtx,
        endpoint: &Endpoint<'_>,
        state: &PipelineState,
        task_description: &str,
    ) -> StageEvent {
        match state {
            PipelineState::NotStarted => {
                self.submit(ctx, endpoint, StageKind::Image, task_description)
                    .await
            }
            PipelineState::ImageReady { image_url } => {
                self.submit(ctx, endpoint, StageKind::Video, image_url).await
            }
            PipelineState::ImageSubmitted { .. } | PipelineState::VideoSubmitted { .. } => {
                StageEvent::PollingStarted
            }
            PipelineState::ImagePolling { handle } | PipelineState::VideoPolling { handle, .. } => {
                self.wait(ctx, endpoint, state.stage(), handle).await
            }
            terminal => StageEvent::SubmitErrored(format!(
                "no step defined for terminal state {}",
                terminal.name()
            )),
        }
    }

    async fn submit(
        &self,
        ctx: &ExecCtx,
        endpoint: &Endpoint<'_>,
        kind: StageKind,
        input: &str,
    ) -> StageEvent {
        emit(&ctx.event_handler, Event::StageStart { stage: kind });
        let spec = self.stage(kind).job_spec(input, &ctx.generation);
        info!(stage = %kind, model = %spec.provider_model_id, "submitting job");

        match ctx.backend.submit(&ctx.client, endpoint, &spec).await {
            Ok(handle) => StageEvent::Submitted(handle),
            Err(PipelineError::Submit { status, body }) => {
                warn!(stage = %kind, status, "provider rejected job");
                StageEvent::SubmitRejected(format!("HTTP {}: {}", status, body))
            }
            Err(e) => {
                warn!(stage = %kind, error = %e, "job submission failed");
                StageEvent::SubmitErrored(e.to_string())
            }
        }
    }

    async fn wait(
        &self,
        ctx: &ExecCtx,
        endpoint: &Endpoint<'_>,
        kind: StageKind,
        handle: &JobHandle,
    ) -> StageEvent {
        let handler = &ctx.event_handler;
        let mut report = |attempt: u32, status: &JobStatus| {
            emit(
                handler,
                Event::PollAttempt {
                    stage: kind,
                    attempt,
                    status: status.label(),
                },
            );
        };
        let on_attempt: &mut (dyn FnMut(u32, &JobStatus) + Send) = &mut report;

        let result = poll::wait(
            ctx.backend.as_ref(),
            &ctx.client,
            endpoint,
            handle,
            &self.stage(kind).poll,
            Some(on_attempt),
        )
        .await;

        match result {
            Ok(result) => StageEvent::Completed(result),
            Err(PollError::Failed(message)) => StageEvent::JobFailed(message),
            Err(PollError::Timeout { elapsed, .. }) => StageEvent::TimedOut(elapsed),
        }
    }

    /// Log and emit events for the state just entered.
    fn observe(&self, ctx: &ExecCtx, state: &PipelineState) {
        match state {
            PipelineState::ImageSubmitted { handle }
            | PipelineState::VideoSubmitted { handle, .. } => {
                info!(stage = %state.stage(), job_id = %handle.id, "job accepted");
                emit(
                    &ctx.event_handler,
                    Event::JobSubmitted {
                        stage: state.stage(),
                        job_id: handle.id.clone(),
                    },
                );
            }
            PipelineState::ImageReady { image_url } => {
                info!(stage = "image", url = %image_url, "stage completed");
                emit(
                    &ctx.event_handler,
                    Event::StageEnd {
                        stage: StageKind::Image,
                        ok: true,
                    },
                );
            }
            PipelineState::VideoReady { video_url, .. } => {
                info!(stage = "video", url = %video_url, "stage completed");
                emit(
                    &ctx.event_handler,
                    Event::StageEnd {
                        stage: StageKind::Video,
                        ok: true,
                    },
                );
            }
            PipelineState::Failed { stage, reason } => {
                warn!(stage = %stage, reason = ?reason, "stage failed");
                emit(&ctx.event_handler, Event::StageEnd { stage: *stage, ok: false });
            }
            PipelineState::TimedOut { stage, elapsed } => {
                warn!(stage = %stage, elapsed_secs = elapsed.as_secs(), "stage timed out");
                emit(&ctx.event_handler, Event::StageEnd { stage: *stage, ok: false });
            }
            PipelineState::NotStarted
            | PipelineState::ImagePolling { .. }
            | PipelineState::VideoPolling { .. } => {}
        }
    }
}
