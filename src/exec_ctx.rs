//! Execution context shared across requests.
//!
//! [`ExecCtx`] carries the HTTP client, job client, provider endpoint,
//! credential source, generation parameters and optional event handler.
//! It is constructed once at startup and only ever read afterwards, so
//! concurrent requests can share it behind an `Arc`.

use crate::backend::{JobClient, ReplicateBackend};
use crate::config::{CredentialSource, GenerationConfig, DEFAULT_BASE_URL};
use crate::events::EventHandler;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only execution context.
///
/// # Example
///
/// ```
/// use video_pipeline::{CredentialSource, ExecCtx};
///
/// let ctx = ExecCtx::builder("https://api.replicate.com/v1")
///     .credential(CredentialSource::fixed("r8_example"))
///     .build();
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Provider API root (e.g. `https://api.replicate.com/v1`).
    pub base_url: String,
    /// Job client. Default: [`ReplicateBackend`].
    pub backend: Arc<dyn JobClient>,
    /// Where the API token is read from on each request.
    pub credential: CredentialSource,
    /// Model ids and generation parameters.
    pub generation: GenerationConfig,
    /// Optional event handler for stage lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            credential: None,
            generation: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Resolve the provider credential for the current request.
    pub fn api_token(&self) -> Option<String> {
        self.credential.resolve()
    }
}

impl Default for ExecCtx {
    fn default() -> Self {
        Self::builder(DEFAULT_BASE_URL).build()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("credential_configured", &self.api_token().is_some())
            .field("generation", &self.generation)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn JobClient>>,
    credential: Option<CredentialSource>,
    generation: Option<GenerationConfig>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the job client. Default: [`ReplicateBackend`].
    pub fn backend(mut self, backend: Arc<dyn JobClient>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the credential source. Default: [`CredentialSource::from_env()`].
    pub fn credential(mut self, credential: CredentialSource) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the generation parameters. Default: [`GenerationConfig::default()`].
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the per-call HTTP timeout. Default: 30 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(30));
        let client = self.client.unwrap_or_else(|| {
            Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new())
        });
        ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(ReplicateBackend)),
            credential: self.credential.unwrap_or_default(),
            generation: self.generation.unwrap_or_default(),
            event_handler: self.event_handler,
        }
    }
}

/// Strip a trailing `/predictions` (and slashes) from a base URL.
/// The job client appends its own path, so this prevents double-pathing.
/// e.g., "https://api.replicate.com/v1/predictions" -> "https://api.replicate.com/v1"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/predictions")
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockJobClient;
    use crate::backend::MockJob;
    use serde_json::json;

    #[test]
    fn test_normalize_base_url_strips_predictions() {
        assert_eq!(
            normalize_base_url("https://api.replicate.com/v1/predictions"),
            "https://api.replicate.com/v1"
        );
        assert_eq!(
            normalize_base_url("https://api.replicate.com/v1/predictions/"),
            "https://api.replicate.com/v1"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url(DEFAULT_BASE_URL), DEFAULT_BASE_URL);
        assert_eq!(
            normalize_base_url("http://localhost:5000/v1/"),
            "http://localhost:5000/v1"
        );
    }

    #[test]
    fn test_builder_defaults() {
        let ctx = ExecCtx::builder("http://localhost:5000/v1").build();
        assert_eq!(ctx.backend.name(), "replicate");
        assert_eq!(ctx.credential, CredentialSource::from_env());
        assert_eq!(ctx.generation, GenerationConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::succeeds_after(0, json!("u"))]));
        let ctx = ExecCtx::builder("http://test")
            .backend(mock)
            .credential(CredentialSource::fixed("tok"))
            .timeout(Duration::from_secs(5))
            .build();
        assert_eq!(ctx.backend.name(), "mock");
        assert_eq!(ctx.api_token().as_deref(), Some("tok"));
    }
}
