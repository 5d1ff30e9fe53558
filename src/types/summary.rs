//! Strategy summary types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::annotation::{AnnotatedItem, StructuredOutput, string_object_schema};

/// Cross-item strategic insights for one reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySummary {
    /// Mechanisms shared by the best-performing creatives.
    pub hit_patterns: String,
    /// What leading competitors are doing differently, per channel.
    pub competitor_tactics: String,
    /// Concrete creative tests to run next.
    pub actionable_advice: String,
}

impl StrategySummary {
    pub const FIELDS: [&'static str; 3] =
        ["hit_patterns", "competitor_tactics", "actionable_advice"];

    /// Fixed summary returned when no synthesis was possible.
    pub fn placeholder() -> Self {
        const UNAVAILABLE: &str = "Strategy summary unavailable for this run.";
        Self {
            hit_patterns: UNAVAILABLE.to_string(),
            competitor_tactics: UNAVAILABLE.to_string(),
            actionable_advice: UNAVAILABLE.to_string(),
        }
    }
}

impl StructuredOutput for StrategySummary {
    fn response_schema() -> Value {
        string_object_schema(&Self::FIELDS)
    }
}

/// Whether the summary came from the model or is the fixed placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Computed,
    Placeholder,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Computed => "computed",
            Self::Placeholder => "placeholder",
        }
    }
}

/// A strategy summary plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub summary: StrategySummary,
    pub status: SummaryStatus,
}

impl StrategyReport {
    pub fn placeholder() -> Self {
        Self {
            summary: StrategySummary::placeholder(),
            status: SummaryStatus::Placeholder,
        }
    }
}

/// One partition of annotated items (e.g. one ad network), in rank order.
#[derive(Debug, Clone, Copy)]
pub struct ChannelBatch<'a, I> {
    pub name: &'a str,
    pub items: &'a [AnnotatedItem<I>],
}

impl<'a, I> ChannelBatch<'a, I> {
    pub fn new(name: &'a str, items: &'a [AnnotatedItem<I>]) -> Self {
        Self { name, items }
    }
}
