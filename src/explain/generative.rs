//! Generated one-sentence explanations
//!
//! The predicted label is turned into a prompt for an external text-generation service
//! (Google Gemini). Every outcome is a value of `AiExplanation`: a healthy leaf needs no
//! call, a missing API key degrades to a fixed message, and service failures become an
//! inline error message instead of a request failure. There are no retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::DiseaseKind;
use crate::utils::error::{Result, RiceDiseaseError};

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Gemini REST endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const NOT_CONFIGURED_MESSAGE: &str = "AI Explanation not available. API key is not configured.";

pub const HEALTHY_MESSAGE: &str =
    "The model has determined the leaf is healthy, showing no signs of disease.";

/// Prompt asking for the visual symptoms of `disease`
pub fn build_prompt(disease: &str) -> String {
    format!(
        "You are a plant pathologist. A deep learning model identified a rice leaf disease as '{0}'. \
         In one simple sentence, describe the key visual symptoms of {0} that the model likely identified.",
        disease
    )
}

/// An external service that completes a prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of asking for a generated explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiExplanation {
    /// Text produced by the service
    Generated(String),
    /// The leaf is healthy; no call was made
    Healthy,
    /// No API key is configured
    NotConfigured,
    /// The call failed with this message
    Failed(String),
}

impl AiExplanation {
    /// Text sent to clients
    pub fn text(&self) -> String {
        match self {
            Self::Generated(text) => text.clone(),
            Self::Healthy => HEALTHY_MESSAGE.to_string(),
            Self::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
            Self::Failed(err) => format!("Error generating AI explanation: {}", err),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            other => other.text(),
        }
    }
}

/// Gemini connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; `None` disables generated explanations
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            // An empty variable counts as unset
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Client for the Gemini `generateContent` REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client; `None` when no API key is configured
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

/// Pull the first candidate's text out of a `generateContent` response
pub fn extract_candidate_text(response: &serde_json::Value) -> Option<String> {
    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.trim().to_string())
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        debug!("Sending request to Gemini model {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| RiceDiseaseError::ExternalService(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RiceDiseaseError::ExternalService(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(RiceDiseaseError::ExternalService(format!(
                "API error {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&body)?;
        extract_candidate_text(&json).ok_or_else(|| {
            RiceDiseaseError::ExternalService("No text in Gemini response".to_string())
        })
    }
}

/// Produces `AiExplanation`s for predicted labels
#[derive(Clone)]
pub struct ExplanationGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for ExplanationGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplanationGenerator")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl ExplanationGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Generator backed by Gemini, or a disabled one without an API key
    pub fn from_config(config: &GeminiConfig) -> Self {
        match GeminiClient::from_config(config) {
            Some(client) => Self::new(Arc::new(client)),
            None => Self::disabled(),
        }
    }

    /// Generator that never calls out
    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Explain a predicted label
    ///
    /// Healthy leaves are answered without a call, even when no key is configured.
    pub async fn explain(&self, label: &str) -> AiExplanation {
        if DiseaseKind::classify(label).is_healthy() {
            return AiExplanation::Healthy;
        }

        let Some(generator) = &self.generator else {
            return AiExplanation::NotConfigured;
        };

        match generator.generate(&build_prompt(label)).await {
            Ok(text) if !text.trim().is_empty() => AiExplanation::Generated(text.trim().to_string()),
            Ok(_) => AiExplanation::Failed("empty response".to_string()),
            Err(e) => {
                warn!("Explanation generation failed for '{}': {}", label, e);
                AiExplanation::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeGenerator {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(reply: std::result::Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .map_err(RiceDiseaseError::ExternalService)
        }
    }

    #[test]
    fn test_prompt_names_disease_twice() {
        let prompt = build_prompt("Blast");
        assert_eq!(
            prompt,
            "You are a plant pathologist. A deep learning model identified a rice leaf disease as 'Blast'. \
             In one simple sentence, describe the key visual symptoms of Blast that the model likely identified."
        );
    }

    #[tokio::test]
    async fn test_missing_key_returns_fallback() {
        let generator = ExplanationGenerator::from_config(&GeminiConfig::new(None));
        assert!(!generator.is_configured());

        let explanation = generator.explain("Brownspot").await;
        assert_eq!(explanation, AiExplanation::NotConfigured);
        assert_eq!(explanation.into_text(), NOT_CONFIGURED_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_key_counts_as_missing() {
        let generator = ExplanationGenerator::from_config(&GeminiConfig::new(Some("  ".into())));
        assert!(!generator.is_configured());
    }

    #[tokio::test]
    async fn test_healthy_skips_the_call() {
        let fake = FakeGenerator::new(Ok("should not be used"));
        let generator = ExplanationGenerator::new(fake.clone());

        assert_eq!(generator.explain("Healthy").await, AiExplanation::Healthy);
        assert!(fake.prompts.lock().unwrap().is_empty());

        assert_eq!(
            ExplanationGenerator::disabled().explain("healthy").await.text(),
            HEALTHY_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let fake = FakeGenerator::new(Ok("  Diamond-shaped gray lesions.\n"));
        let generator = ExplanationGenerator::new(fake.clone());

        let explanation = generator.explain("Blast").await;
        assert_eq!(
            explanation,
            AiExplanation::Generated("Diamond-shaped gray lesions.".to_string())
        );
        assert_eq!(fake.prompts.lock().unwrap()[0], build_prompt("Blast"));
    }

    #[tokio::test]
    async fn test_failure_becomes_inline_message() {
        let generator = ExplanationGenerator::new(FakeGenerator::new(Err("quota exceeded")));

        let text = generator.explain("Tungro").await.into_text();
        assert!(text.starts_with("Error generating AI explanation: "));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn test_extract_candidate_text() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": " Yellow streaks. " }] } }]
        });
        assert_eq!(extract_candidate_text(&json), Some("Yellow streaks.".to_string()));
        assert_eq!(extract_candidate_text(&serde_json::json!({})), None);
    }

    #[test]
    fn test_endpoint() {
        let config = GeminiConfig::new(Some("secret".into())).with_base_url("http://localhost:9/v1/");
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1/models/gemini-1.5-flash-latest:generateContent?key=secret"
        );
    }
}
