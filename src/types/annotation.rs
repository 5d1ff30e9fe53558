//! Annotation results and their per-item status

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{HuginnError, Result};

/// A structured payload produced by schema-constrained inference.
///
/// Implementors describe their own response schema and decode strictly:
/// a response that does not match the shape is a [`HuginnError::Decode`].
pub trait StructuredOutput: DeserializeOwned + Send + 'static {
    /// Response schema in the annotation service's OpenAPI subset.
    fn response_schema() -> Value;

    /// Decode a raw model response.
    ///
    /// Tolerates a surrounding markdown code fence; anything else that does
    /// not match the schema is rejected.
    fn decode(raw: &str) -> Result<Self> {
        let body = strip_code_fence(raw.trim());
        serde_json::from_str(body).map_err(|e| HuginnError::Decode(e.to_string()))
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Build an object schema of required string properties.
pub(crate) fn string_object_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| ((*f).to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": fields,
    })
}

/// Creative attributes extracted from one video ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationResult {
    /// How the first three seconds grab attention.
    pub hook_design: String,
    /// The emotion the ad evokes.
    pub emotional_appeal: String,
    /// Narrative or gameplay order.
    pub content_structure: String,
    /// The single most satisfying moment.
    pub wow_factor: String,
    /// On-screen text, voice-over and call to action.
    pub copywriting_features: String,
}

impl AnnotationResult {
    pub const FIELDS: [&'static str; 5] = [
        "hook_design",
        "emotional_appeal",
        "content_structure",
        "wow_factor",
        "copywriting_features",
    ];

    /// Fixed stand-in used when the remote path fails.
    ///
    /// Always identical so consumers can recognise it, but the status tag on
    /// [`AnnotatedItem`] is the authoritative signal.
    pub fn placeholder() -> Self {
        const UNAVAILABLE: &str = "Analysis unavailable for this creative.";
        Self {
            hook_design: UNAVAILABLE.to_string(),
            emotional_appeal: UNAVAILABLE.to_string(),
            content_structure: UNAVAILABLE.to_string(),
            wow_factor: UNAVAILABLE.to_string(),
            copywriting_features: UNAVAILABLE.to_string(),
        }
    }

    /// One-line digest used as summary input.
    pub fn compact(&self) -> String {
        format!(
            "hook: {} | emotion: {} | structure: {} | wow: {} | copy: {}",
            self.hook_design,
            self.emotional_appeal,
            self.content_structure,
            self.wow_factor,
            self.copywriting_features
        )
    }
}

impl StructuredOutput for AnnotationResult {
    fn response_schema() -> Value {
        string_object_schema(&Self::FIELDS)
    }
}

/// Where an item's annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    /// Served from the persistent cache without a remote call.
    Cached,
    /// Computed by the annotation service during this run.
    Computed,
    /// The remote path failed; the annotation (if any) is a placeholder.
    Degraded,
}

impl AnnotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::Computed => "computed",
            Self::Degraded => "degraded",
        }
    }

    /// Whether the annotation is genuine model output.
    pub fn is_genuine(&self) -> bool {
        !matches!(self, Self::Degraded)
    }
}

/// An item together with its annotation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem<I> {
    #[serde(flatten)]
    pub item: I,
    pub annotation: Option<AnnotationResult>,
    pub status: AnnotationStatus,
}

impl<I> AnnotatedItem<I> {
    pub fn cached(item: I, annotation: AnnotationResult) -> Self {
        Self {
            item,
            annotation: Some(annotation),
            status: AnnotationStatus::Cached,
        }
    }

    pub fn computed(item: I, annotation: AnnotationResult) -> Self {
        Self {
            item,
            annotation: Some(annotation),
            status: AnnotationStatus::Computed,
        }
    }

    /// Degraded item carrying the fixed placeholder annotation.
    pub fn degraded(item: I) -> Self {
        Self {
            item,
            annotation: Some(AnnotationResult::placeholder()),
            status: AnnotationStatus::Degraded,
        }
    }

    /// Degraded item with no annotation at all (the worker itself died).
    pub fn unannotated(item: I) -> Self {
        Self {
            item,
            annotation: None,
            status: AnnotationStatus::Degraded,
        }
    }

    /// The annotation, only if it is genuine model output.
    pub fn genuine_annotation(&self) -> Option<&AnnotationResult> {
        if self.status.is_genuine() {
            self.annotation.as_ref()
        } else {
            None
        }
    }
}
