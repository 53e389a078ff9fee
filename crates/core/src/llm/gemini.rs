use crate::config::{ConfigError, GeminiConfig, Settings, GEMINI_API_KEY};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{Provider, TextGenerator};
use anyhow::Context;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: HeaderValue,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    /// Fails before any network traffic if the key is absent or cannot be sent as a header.
    pub fn new(config: GeminiConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::Missing(GEMINI_API_KEY));
        }
        let mut api_key = HeaderValue::from_str(api_key).map_err(|e| ConfigError::Invalid {
            name: GEMINI_API_KEY,
            value: "<redacted>".to_string(),
            reason: e.to_string(),
        })?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url,
            model: config.model,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(settings.gemini_config()?)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<(serde_json::Value, GenerateContentResponse)> {
        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.clone())
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    fn response_text(
        res: &GenerateContentResponse,
        raw_json: &serde_json::Value,
    ) -> Result<String, LlmDiagnosticsError> {
        let diagnostics = |stage: &'static str, detail: String| LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage,
            detail,
            raw_output: None,
            raw_response_json: Some(raw_json.clone()),
        };

        if let Some(reason) = res
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(diagnostics("blocked", format!("block_reason={reason}")));
        }

        let Some(candidate) = res.candidates.first() else {
            return Err(diagnostics("empty", "no candidates".to_string()));
        };

        let mut out = String::new();
        if let Some(content) = &candidate.content {
            for text in content.parts.iter().filter_map(|p| p.text.as_deref()) {
                out.push_str(text);
            }
        }

        if out.trim().is_empty() {
            return Err(diagnostics(
                "empty",
                format!(
                    "candidate has no text (finish_reason={})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
        let (raw_json, res) = self.generate_content(&self.request(prompt)).await?;

        if let Some(candidate) = res.candidates.first() {
            if matches!(candidate.finish_reason.as_deref(), Some("MAX_TOKENS")) {
                tracing::warn!(
                    model = %self.model,
                    max_output_tokens = self.max_output_tokens,
                    "Gemini finish_reason=MAX_TOKENS; output is likely truncated"
                );
            }
        }

        Ok(Self::response_text(&res, &raw_json)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
