//! The generative service seam and its Gemini REST implementation.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::generation::{
    Candidate, Contents, GenerateRequest, GenerateResponse, GroundingMetadata, Part,
    ThinkingConfig, Tool,
};
use crate::error::NetworkFailure;
use crate::io::config::ApiConfig;

/// Something that turns a [`GenerateRequest`] into model text.
///
/// The pipeline only talks to this trait; tests substitute a scripted fake.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, NetworkFailure>;
}

/// Client for the Gemini `models/{model}:generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from config, reading the API key from the configured variable.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let api_key = env::var(&api.api_key_env)
            .with_context(|| format!("environment variable {} is not set", api.api_key_env))?;
        Self::new(&api.base_url, api_key, Duration::from_secs(api.timeout_secs))
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, NetworkFailure> {
        let body = GenerateContentBody::from_request(request);
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| NetworkFailure::new(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| NetworkFailure::new(format!("decode response: {err}")))?;
        let result = parsed.into_response()?;
        debug!(chars = result.text.len(), "generation finished");
        Ok(result)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let parts = match &request.contents {
            Contents::Text(text) => vec![WirePart::Text { text }],
            Contents::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    Part::Text(text) => WirePart::Text { text },
                    Part::InlineImage(image) => WirePart::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                })
                .collect(),
        };
        let config = &request.config;
        let generation_config = (config.thinking_config.is_some()
            || config.response_mime_type.is_some())
        .then(|| GenerationConfig {
            thinking_config: config.thinking_config,
            response_mime_type: config.response_mime_type.as_deref(),
        });

        Self {
            contents: vec![WireContent {
                role: Some("user"),
                parts,
            }],
            system_instruction: config.system_instruction.as_deref().map(|text| WireContent {
                role: None,
                parts: vec![WirePart::Text { text }],
            }),
            tools: config
                .tools
                .iter()
                .map(|tool| match tool {
                    Tool::WebSearch => WireTool {
                        google_search: GoogleSearch {},
                    },
                })
                .collect(),
            generation_config,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<ContentResponse>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// Text of the first candidate (thought parts excluded) plus grounding metadata.
    fn into_response(self) -> Result<GenerateResponse, NetworkFailure> {
        if self.candidates.is_empty() {
            return Err(NetworkFailure::new("response contained no candidates"));
        }
        let text = self.candidates[0]
            .content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();
        let candidates = self
            .candidates
            .into_iter()
            .map(|candidate| Candidate {
                grounding_metadata: candidate.grounding_metadata,
            })
            .collect();
        Ok(GenerateResponse { text, candidates })
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> NetworkFailure {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());
    NetworkFailure::with_status(status.as_u16(), message)
}
