//! Generation parameters, credential lookup and server settings.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::{error::Result, PipelineError};

/// Environment variable holding the provider API token.
pub const API_TOKEN_VAR: &str = "REPLICATE_API_TOKEN";

/// Default provider API root.
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Model identifiers and tunable parameters for both stages.
///
/// Passed into [`Stage::job_spec`](crate::stage::Stage::job_spec) so tests
/// and alternative providers can substitute their own values.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Text-to-image model version.
    pub image_model: String,

    /// Image-to-video model version.
    pub video_model: String,

    /// Qualifiers appended to the task description to form the image prompt.
    pub style_qualifiers: String,

    /// Negative prompt for the image stage.
    pub negative_prompt: String,

    pub width: u32,
    pub height: u32,

    /// Denoising steps for the image stage.
    pub num_inference_steps: u32,

    /// Classifier-free guidance for the image stage.
    pub guidance_scale: f64,

    /// Motion amount for the video stage (higher = more motion).
    pub motion_bucket_id: u32,

    /// Frame rate of the produced video.
    pub frames_per_second: u32,

    /// Noise added to the conditioning image.
    pub cond_aug: f64,

    /// Frame-count preset understood by the video model.
    pub video_length: String,

    /// How the conditioning image is resized for the video model.
    pub sizing_strategy: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            image_model: "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b"
                .to_string(),
            video_model: "3f0457e4619daac51203dedb472816fd4af51f3149fa7a9e0b5ffcf1b8172438"
                .to_string(),
            style_qualifiers: "cinematic, highly detailed, professional lighting, 4k".to_string(),
            negative_prompt: "blurry, low quality, distorted, deformed, watermark, text"
                .to_string(),
            width: 1024,
            height: 576,
            num_inference_steps: 30,
            guidance_scale: 7.5,
            motion_bucket_id: 127,
            frames_per_second: 6,
            cond_aug: 0.02,
            video_length: "25_frames_with_svd_xt".to_string(),
            sizing_strategy: "maintain_aspect_ratio".to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_inference_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    pub fn with_motion(mut self, motion_bucket_id: u32) -> Self {
        self.motion_bucket_id = motion_bucket_id;
        self
    }

    pub fn with_style_qualifiers(mut self, qualifiers: impl Into<String>) -> Self {
        self.style_qualifiers = qualifiers.into();
        self
    }

    pub fn with_negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = prompt.into();
        self
    }
}

/// Where the provider credential comes from.
///
/// The credential is resolved on every request, so a token exported after
/// startup is picked up without a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read the named environment variable.
    Env(String),
    /// A fixed value; `None` models a missing credential.
    Fixed(Option<String>),
}

impl CredentialSource {
    /// The default source: [`API_TOKEN_VAR`].
    pub fn from_env() -> Self {
        Self::Env(API_TOKEN_VAR.to_string())
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self::Fixed(Some(token.into()))
    }

    /// Resolve the credential. Blank values count as missing.
    pub fn resolve(&self) -> Option<String> {
        let value = match self {
            Self::Env(var) => env::var(var).ok(),
            Self::Fixed(value) => value.clone(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Settings for the HTTP server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Provider API root.
    pub base_url: String,
    /// Per-call HTTP timeout for provider requests.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; real deployments set variables directly.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| PipelineError::InvalidConfig(format!("PORT must be a number, got '{}'", raw)))?,
            None => defaults.port,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                PipelineError::InvalidConfig(format!(
                    "REQUEST_TIMEOUT_SECS must be a number, got '{}'",
                    raw
                ))
            })?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            port,
            base_url: lookup("REPLICATE_BASE_URL").unwrap_or(defaults.base_url),
            request_timeout,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_server_config_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("REPLICATE_BASE_URL", "http://localhost:5000/v1"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url, "http://localhost:5000/v1");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_addr().port(), 8080);
    }

    #[test]
    fn test_server_config_bad_port() {
        let result = ServerConfig::from_lookup(lookup_from(&[("PORT", "eighty")]));
        match result.unwrap_err() {
            PipelineError::InvalidConfig(msg) => assert!(msg.contains("PORT")),
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_credential_fixed() {
        assert_eq!(CredentialSource::fixed("r8_abc").resolve().as_deref(), Some("r8_abc"));
        assert_eq!(CredentialSource::Fixed(None).resolve(), None);
        assert_eq!(CredentialSource::fixed("   ").resolve(), None);
    }

    #[test]
    fn test_credential_env_missing() {
        let source = CredentialSource::Env("VIDEO_PIPELINE_TEST_UNSET_TOKEN".to_string());
        assert_eq!(source.resolve(), None);
    }

    #[test]
    fn test_generation_config_builders() {
        let config = GenerationConfig::default()
            .with_image_model("img-v1")
            .with_video_model("vid-v1")
            .with_resolution(512, 512)
            .with_inference_steps(10)
            .with_motion(40);
        assert_eq!(config.image_model, "img-v1");
        assert_eq!(config.video_model, "vid-v1");
        assert_eq!((config.width, config.height), (512, 512));
        assert_eq!(config.num_inference_steps, 10);
        assert_eq!(config.motion_bucket_id, 40);
    }
}
