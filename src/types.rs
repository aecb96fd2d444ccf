use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

use crate::stage::StageKind;

/// Output of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// The primary output value (a URL).
    pub primary_output: String,
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Both stages finished.
    Success { image_url: String, video_url: String },

    /// The inbound request was unusable. No provider calls were made.
    ValidationError { message: String },

    /// The provider credential is not configured. No provider calls were made.
    ConfigurationError { message: String },

    /// The provider rejected job creation for `stage`.
    UpstreamSubmitError { stage: StageKind, detail: String },

    /// `stage` exhausted its polling budget.
    UpstreamTimeout { stage: StageKind, elapsed: Duration },

    /// The provider reported the `stage` job as failed.
    UpstreamFailure { stage: StageKind, detail: String },

    /// Anything else (transport failure on submit, undecodable response, ...).
    UnexpectedError { detail: String },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The stage the outcome is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::UpstreamSubmitError { stage, .. }
            | Self::UpstreamTimeout { stage, .. }
            | Self::UpstreamFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Request priority, echoed back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Inbound request at the HTTP boundary.
///
/// `task_description` is optional at the type level so its absence can be
/// reported as a validation error rather than a decoding error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    #[serde(default)]
    pub task_description: Option<String>,

    /// Absent or `null` both mean [`Priority::Medium`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,

    /// Caller's estimate; echoed only.
    #[serde(default)]
    pub expected_duration: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl VideoRequest {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: Some(task_description.into()),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
