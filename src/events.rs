//! Event system for stage lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a pipeline run.
//! Stages emit events when they start, when their job is accepted, after
//! every status check and when they finish. Implement [`EventHandler`] to
//! receive them for progress tracking or custom telemetry.

use std::sync::Arc;

use crate::stage::StageKind;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A stage is about to submit its job.
    StageStart {
        stage: StageKind,
    },
    /// The provider accepted the stage's job.
    JobSubmitted {
        stage: StageKind,
        /// Provider job id.
        job_id: String,
    },
    /// One status check completed.
    PollAttempt {
        stage: StageKind,
        /// The attempt number (1-indexed).
        attempt: u32,
        /// Observed status label (`starting`, `processing`, `succeeded`, `failed`).
        status: &'static str,
    },
    /// A stage has finished, successfully or not.
    StageEnd {
        stage: StageKind,
        /// Whether the stage produced an output.
        ok: bool,
    },
}

/// Handler for pipeline lifecycle events.
///
/// This is entirely optional -- pipelines work without an event handler.
///
/// # Example
///
/// ```
/// use video_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::StageStart { stage } => println!("[start] {}", stage),
///             Event::StageEnd { stage, ok } => println!("[end] {} ok={}", stage, ok),
///             _ => {} // JobSubmitted, PollAttempt
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use video_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::PollAttempt { stage, attempt, .. } = event {
///         println!("{} attempt {}", stage, attempt);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
