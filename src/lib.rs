//! # Video Pipeline
//!
//! Turns a natural-language task description into a short video by chaining
//! two asynchronous inference jobs: text-to-image, then image-to-video.
//!
//! The inference itself is delegated to an external provider. This crate is
//! the orchestration layer: it submits jobs, polls them under bounded
//! per-stage budgets, and reports submit failures, provider failures and
//! timeouts as distinct, stage-attributed outcomes.
//!
//! ## Core Concepts
//!
//! - **[`JobClient`]**: object-safe trait over the provider: `submit` a
//!   [`JobSpec`], `poll` a [`JobHandle`]. Built-ins: [`ReplicateBackend`],
//!   [`MockJobClient`].
//! - **[`poll::wait`]**: fixed-interval polling bounded by a [`PollConfig`].
//! - **[`StagePipeline`]**: the image → video state machine.
//! - **[`RequestHandler`]**: validation plus outcome → response mapping.
//! - **[`ExecCtx`]**: shared, read-only context (HTTP client, job client,
//!   credential source, generation parameters, optional event handler).
//!
//! ## Quick Start
//!
//! ```no_run
//! use video_pipeline::{CredentialSource, ExecCtx, PipelineOutcome, StagePipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = ExecCtx::builder("https://api.replicate.com/v1")
//!         .credential(CredentialSource::from_env())
//!         .build();
//!
//!     match StagePipeline::new().run(&ctx, "a dancing cat").await {
//!         PipelineOutcome::Success { image_url, video_url } => {
//!             println!("image: {image_url}\nvideo: {video_url}");
//!         }
//!         other => eprintln!("generation failed: {other:?}"),
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod handler;
pub mod pipeline;
pub mod poll;
pub mod server;
pub mod stage;
pub mod types;

pub use backend::{
    primary_output, Endpoint, JobClient, JobHandle, JobSpec, JobStatus, MockJob, MockJobClient,
    ReplicateBackend,
};
pub use config::{CredentialSource, GenerationConfig, ServerConfig};
pub use error::{PipelineError, PollError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use handler::{HandlerResponse, RequestHandler};
pub use pipeline::{PipelineState, StageEvent, StagePipeline};
pub use poll::PollConfig;
pub use stage::{Stage, StageKind};
pub use types::{PipelineOutcome, Priority, StageResult, VideoRequest};
