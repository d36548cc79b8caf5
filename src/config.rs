//! Configuration types for batch barcode extraction.
//!
//! All batch behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across calls, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model. Cheap, fast, and accurate enough to read
/// packaging-print digits.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for a batch extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use barcode2xlsx::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .max_retries(2)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Chat-completion endpoint URL. Default: [`DEFAULT_ENDPOINT`].
    ///
    /// Any OpenAI-compatible endpoint that supports vision input and
    /// function calling works here (e.g. a LiteLLM or vLLM gateway).
    pub endpoint: String,

    /// Bearer credential for the endpoint.
    ///
    /// If `None`, the `OPENAI_API_KEY` environment variable is read when
    /// the batch starts. A missing credential is a fatal
    /// [`ExtractError::CredentialMissing`]. The key is never embedded in
    /// source and never printed; `Debug` redacts it.
    pub api_key: Option<String>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the digits it sees on
    /// the packaging. Higher values introduce variation that worsens
    /// extraction accuracy.
    pub temperature: f32,

    /// Maximum tokens the model may generate per photo. Default: 500.
    ///
    /// The structured payload is four short fields; 500 tokens covers it
    /// with room for long oval-mark text while keeping per-photo cost
    /// predictable.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient API failure. Default: 3.
    ///
    /// Connection errors, timeouts, 429 and 5xx responses are transient
    /// and retried. Permanent errors (bad credential, 400) are not; they
    /// fall straight through to the sentinel row for that file.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff).
    /// Default: 500.
    ///
    /// Doubles after each attempt: 500 ms, 1 s, 2 s.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 60.
    ///
    /// A timeout counts as a transient failure. Without it, one hung
    /// request would stall the entire sequential batch indefinitely.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If `None`, uses the built-in default in
    /// [`crate::prompts`].
    pub system_prompt: Option<String>,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 500,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.endpoint.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Endpoint URL must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 500);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert_eq!(c.api_timeout_secs, 60);
        assert!(c.api_key.is_none());
        assert!(c.system_prompt.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ExtractionConfig::builder()
            .temperature(7.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);

        let c = ExtractionConfig::builder()
            .temperature(-1.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn builder_rejects_empty_endpoint() {
        let err = ExtractionConfig::builder().endpoint("  ").build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = ExtractionConfig::builder().model("").build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
