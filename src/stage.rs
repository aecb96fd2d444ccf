use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::{backend::JobSpec, config::GenerationConfig, poll::PollConfig};

/// Which of the two pipeline stages a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Text-to-image.
    Image,
    /// Image-to-video.
    Video,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Capitalized label for user-facing messages.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stage in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Image or video.
    pub kind: StageKind,

    /// Polling budget for this stage's job.
    pub poll: PollConfig,
}

impl Stage {
    /// The text-to-image stage with its default budget.
    pub fn image() -> Self {
        Self {
            kind: StageKind::Image,
            poll: PollConfig::image(),
        }
    }

    /// The image-to-video stage with its default budget.
    pub fn video() -> Self {
        Self {
            kind: StageKind::Video,
            poll: PollConfig::video(),
        }
    }

    /// Override the polling budget.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Build the job for this stage.
    ///
    /// For the image stage `input` is the task description; for the video
    /// stage it is the URL produced by the image stage.
    pub fn job_spec(&self, input: &str, config: &GenerationConfig) -> JobSpec {
        match self.kind {
            StageKind::Image => image_job_spec(input, config),
            StageKind::Video => video_job_spec(input, config),
        }
    }
}

/// Decorate the task description with the configured style qualifiers.
pub fn render_image_prompt(task_description: &str, config: &GenerationConfig) -> String {
    let task = task_description.trim();
    let style = config.style_qualifiers.trim();
    if style.is_empty() {
        task.to_string()
    } else {
        format!("{}, {}", task, style)
    }
}

fn image_job_spec(task_description: &str, config: &GenerationConfig) -> JobSpec {
    let input = object(json!({
        "prompt": render_image_prompt(task_description, config),
        "negative_prompt": config.negative_prompt,
        "width": config.width,
        "height": config.height,
        "num_inference_steps": config.num_inference_steps,
        "guidance_scale": config.guidance_scale,
        "num_outputs": 1,
    }));
    JobSpec::new(config.image_model.clone(), input)
}

fn video_job_spec(image_url: &str, config: &GenerationConfig) -> JobSpec {
    let input = object(json!({
        "input_image": image_url,
        "video_length": config.video_length,
        "sizing_strategy": config.sizing_strategy,
        "frames_per_second": config.frames_per_second,
        "motion_bucket_id": config.motion_bucket_id,
        "cond_aug": config.cond_aug,
    }));
    JobSpec::new(config.video_model.clone(), input)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stage_defaults() {
        assert_eq!(Stage::image().kind, StageKind::Image);
        assert_eq!(Stage::image().poll.max_attempts, 45);
        assert_eq!(Stage::video().poll.max_attempts, 90);

        let quick = Stage::video().with_poll(PollConfig::new(Duration::from_millis(5), 3));
        assert_eq!(quick.poll.max_attempts, 3);
    }

    #[test]
    fn test_prompt_rendering() {
        let config = GenerationConfig::default().with_style_qualifiers("watercolor, soft light");
        assert_eq!(
            render_image_prompt("  a dancing cat ", &config),
            "a dancing cat, watercolor, soft light"
        );
    }

    #[test]
    fn test_prompt_rendering_no_style() {
        let config = GenerationConfig::default().with_style_qualifiers("");
        assert_eq!(render_image_prompt("a dancing cat", &config), "a dancing cat");
    }

    #[test]
    fn test_image_job_spec() {
        let config = GenerationConfig::default()
            .with_image_model("img-v1")
            .with_resolution(768, 432)
            .with_negative_prompt("blurry");
        let spec = Stage::image().job_spec("a dancing cat", &config);

        assert_eq!(spec.provider_model_id, "img-v1");
        assert!(spec.input["prompt"].as_str().unwrap().starts_with("a dancing cat, "));
        assert_eq!(spec.input["negative_prompt"], "blurry");
        assert_eq!(spec.input["width"], 768);
        assert_eq!(spec.input["height"], 432);
        assert_eq!(spec.input["num_outputs"], 1);
    }

    #[test]
    fn test_video_job_spec_references_image() {
        let config = GenerationConfig::default().with_video_model("vid-v1").with_motion(90);
        let spec = Stage::video().job_spec("https://img/x.png", &config);

        assert_eq!(spec.provider_model_id, "vid-v1");
        assert_eq!(spec.input["input_image"], "https://img/x.png");
        assert_eq!(spec.input["motion_bucket_id"], 90);
        assert_eq!(spec.input["frames_per_second"], 6);
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Image.to_string(), "image");
        assert_eq!(StageKind::Video.title(), "Video");
        assert_eq!(serde_json::to_value(StageKind::Video).unwrap(), "video");
    }
}
