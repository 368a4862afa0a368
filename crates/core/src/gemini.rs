//! Gemini `generateContent` client and the backend seam the rest of the crate talks to.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    error::{Result, ScenaristError},
    format::{extract_json, strip_code_fences},
    prompt::{SCENARIO_SYSTEM_INSTRUCTION, build_scenario_prompt, build_thumbnail_prompt},
    types::{ChatRole, ChatTurn, GenerateRequest, GenerateResult, GroundingSource, ImageData},
};

/// The external generative service. Everything that produces content goes through here.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_scenario(&self, request: &GenerateRequest) -> Result<GenerateResult>;

    async fn generate_thumbnail(&self, idea: &str) -> Result<ImageData>;

    async fn chat(&self, system_instruction: &str, history: &[ChatTurn]) -> Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ChatRole>,
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    title: Option<String>,
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated answer text, skipping thought summaries.
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| {
                m.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| match (&web.title, &web.uri) {
                        (Some(title), Some(uri)) if !title.is_empty() && !uri.is_empty() => {
                            Some(GroundingSource {
                                title: title.clone(),
                                uri: uri.clone(),
                            })
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Decode the model's reply text into a result. Fields it omitted come back empty;
/// anything that is not a JSON object is an error.
pub fn parse_generate_result(raw: &str) -> Result<GenerateResult> {
    let json = extract_json(strip_code_fences(raw));
    Ok(serde_json::from_str(json)?)
}

pub struct GeminiClient {
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
    chat_model: String,
    thinking_budget: u32,
    search_grounding: bool,
    client: Client,
}

impl GeminiClient {
    /// Create a client; fails when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.api_key()?.to_string();

        Ok(Self {
            api_key,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            text_model: settings.text_model.clone(),
            image_model: settings.image_model.clone(),
            chat_model: settings.chat_model.clone(),
            thinking_budget: settings.thinking_budget,
            search_grounding: settings.search_grounding,
            client: Client::new(),
        })
    }

    async fn generate_content(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(model, status = status.as_u16(), %message, "Gemini request failed");
            return Err(ScenaristError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_scenario(&self, request: &GenerateRequest) -> Result<GenerateResult> {
        let mut parts: Vec<Part> = request
            .input
            .attachments
            .iter()
            .map(|a| Part {
                inline_data: Some(InlineData {
                    mime_type: a.mime_type.clone(),
                    data: a.data_base64.clone(),
                }),
                ..Default::default()
            })
            .collect();
        parts.push(Part::text(build_scenario_prompt(request)));

        // JSON mode and search grounding cannot be combined; with search on,
        // the JSON is recovered from the text instead.
        let (tools, response_mime_type) = if self.search_grounding {
            (
                vec![Tool {
                    google_search: GoogleSearch {},
                }],
                None,
            )
        } else {
            (Vec::new(), Some("application/json".to_string()))
        };

        let body = GeminiRequest {
            contents: vec![Content {
                role: Some(ChatRole::User),
                parts,
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(SCENARIO_SYSTEM_INSTRUCTION)],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type,
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: self.thinking_budget,
                }),
                image_config: None,
            }),
            tools,
        };

        info!(
            model = %self.text_model,
            attachments = request.input.attachments.len(),
            platform = %request.options.platform,
            "Generating scenario"
        );
        let response = self.generate_content(&self.text_model, &body).await?;

        let raw = response.text().unwrap_or_else(|| "{}".to_string());
        debug!(chars = raw.len(), "Scenario reply received");

        let mut result = parse_generate_result(&raw)?;
        let sources = response.sources();
        result.sources = (!sources.is_empty()).then_some(sources);

        Ok(result)
    }

    async fn generate_thumbnail(&self, idea: &str) -> Result<ImageData> {
        let body = GeminiRequest {
            contents: vec![Content {
                role: Some(ChatRole::User),
                parts: vec![Part::text(build_thumbnail_prompt(idea))],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: "16:9".to_string(),
                    image_size: "1K".to_string(),
                }),
                ..Default::default()
            }),
            tools: Vec::new(),
        };

        info!(model = %self.image_model, "Generating thumbnail");
        let response = self.generate_content(&self.image_model, &body).await?;

        response
            .first_parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
            .map(|d| ImageData {
                mime_type: if d.mime_type.is_empty() {
                    "image/png".to_string()
                } else {
                    d.mime_type.clone()
                },
                data_base64: d.data.clone(),
            })
            .ok_or(ScenaristError::NoImage)
    }

    async fn chat(&self, system_instruction: &str, history: &[ChatTurn]) -> Result<String> {
        let body = GeminiRequest {
            contents: history
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role),
                    parts: vec![Part::text(turn.text.clone())],
                })
                .collect(),
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(system_instruction)],
            }),
            generation_config: None,
            tools: Vec::new(),
        };

        debug!(model = %self.chat_model, turns = history.len(), "Sending chat turn");
        let response = self.generate_content(&self.chat_model, &body).await?;
        Ok(response.text().unwrap_or_default())
    }
}
