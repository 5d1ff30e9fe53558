//! Gemini API client: file upload, file state, file delete, and
//! schema-constrained `generateContent`.
//!
//! See: <https://ai.google.dev/api/files> and
//! <https://ai.google.dev/api/generate-content>

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::AnnotationService;
use crate::types::{AssetState, InferenceRequest, Part, RemoteAsset};
use crate::{HuginnError, Result};

/// Default base URL for the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    http: Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a client against the public Gemini endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for proxies and wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        // Inference over a processed video regularly takes well over a minute.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map a non-success response to a typed error.
    ///
    /// Consumes the response to capture the error body for diagnostics.
    async fn check(response: Response, model: Option<&str>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let message = error_message(response).await;

        Err(match status.as_u16() {
            401 | 403 => HuginnError::AuthenticationFailed,
            // Only a model endpoint 404 means the model is gone.
            404 => match model {
                Some(model) => HuginnError::ModelNotFound(model.to_string()),
                None => HuginnError::Api {
                    status: 404,
                    message,
                },
            },
            429 => HuginnError::RateLimited { retry_after },
            code @ 500..=599 => HuginnError::Server {
                status: code,
                message,
            },
            code => HuginnError::Api {
                status: code,
                message,
            },
        })
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }
}

/// Pull `error.message` out of a Google error body, or fall back to the raw text.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        })
}

#[async_trait]
impl AnnotationService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteAsset> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HuginnError::Upload(format!("cannot read {}: {e}", path.display())))?;

        let response = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-Upload-File-Name", display_name)
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| HuginnError::Upload(e.to_string()))?;

        let response = match Self::check(response, None).await {
            Ok(r) => r,
            Err(HuginnError::AuthenticationFailed) => return Err(HuginnError::AuthenticationFailed),
            Err(e) => return Err(HuginnError::Upload(e.to_string())),
        };

        let envelope: UploadResponse = response
            .json()
            .await
            .map_err(|e| HuginnError::Upload(format!("unreadable upload response: {e}")))?;
        Ok(envelope.file.into())
    }

    async fn asset(&self, name: &str) -> Result<RemoteAsset> {
        let response = self
            .http
            .get(self.file_url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;

        let file: FileResource = Self::check(response, None)
            .await?
            .json()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        Ok(file.into())
    }

    async fn delete_asset(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.file_url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        Self::check(response, None).await?;
        Ok(())
    }

    async fn generate(&self, model: &str, request: &InferenceRequest) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest::from(request))
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;

        let body: GenerateResponse = Self::check(response, Some(model))
            .await?
            .json()
            .await
            .map_err(|e| HuginnError::Decode(format!("unreadable generateContent body: {e}")))?;

        body.into_text()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
}

impl From<FileResource> for RemoteAsset {
    fn from(file: FileResource) -> Self {
        let state = match file.state.as_deref() {
            Some("ACTIVE") => AssetState::Ready,
            Some("FAILED") => AssetState::Failed,
            // PROCESSING, STATE_UNSPECIFIED, or absent
            _ => AssetState::Pending,
        };
        RemoteAsset {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_resolution: Option<&'static str>,
}

impl<'a> From<&'a InferenceRequest> for GenerateRequest<'a> {
    fn from(request: &'a InferenceRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::Text { text },
                Part::File { mime_type, uri } => WirePart::File {
                    file_data: FileData {
                        mime_type,
                        file_uri: uri,
                    },
                },
            })
            .collect();

        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.response_schema,
                media_resolution: request
                    .low_media_resolution
                    .then_some("MEDIA_RESOLUTION_LOW"),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(HuginnError::Decode(format!("prompt blocked: {reason}")));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| HuginnError::Decode("response has no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(HuginnError::Decode(format!(
                "empty response (finish reason: {reason})"
            )));
        }
        Ok(text)
    }
}
