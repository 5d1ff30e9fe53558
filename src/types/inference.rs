//! Request and asset types shared by annotation service clients

use serde_json::Value;

/// One part of an inference request.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Reference to an uploaded remote asset.
    File { mime_type: String, uri: String },
}

/// A schema-constrained inference request, independent of the model.
///
/// The retry coordinator replays the same request against each candidate
/// model, so it is built once and borrowed per attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub parts: Vec<Part>,
    pub response_schema: Value,
    /// Ask the service to sample media at low resolution (saves tokens on video).
    pub low_media_resolution: bool,
}

impl InferenceRequest {
    pub fn new(response_schema: Value) -> Self {
        Self {
            parts: Vec::new(),
            response_schema,
            low_media_resolution: false,
        }
    }

    pub fn file(mut self, mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        self.parts.push(Part::File {
            mime_type: mime_type.into(),
            uri: uri.into(),
        });
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn low_media_resolution(mut self, enabled: bool) -> Self {
        self.low_media_resolution = enabled;
        self
    }
}

/// Processing state of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Ready,
    Failed,
}

/// Handle to a file uploaded to the annotation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// Service-side resource name, used for polling and deletion.
    pub name: String,
    /// URI to reference the asset from an inference request.
    pub uri: String,
    pub mime_type: String,
    pub state: AssetState,
}
