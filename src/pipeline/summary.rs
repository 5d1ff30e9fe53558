//! Strategy summary synthesis over one batch of annotated items.
//!
//! One retry-wrapped inference call per run. The summary is never cached and
//! never fatal: offline mode, an empty batch, or an exhausted retry all
//! yield [`StrategyReport::placeholder()`].

use std::sync::Arc;

use tracing::{error, info};

use crate::providers::retry::{RetryConfig, invoke_with_fallback};
use crate::providers::traits::AnnotationService;
use crate::telemetry;
use crate::types::{
    ChannelBatch, InferenceRequest, Item, StrategyReport, StrategySummary, StructuredOutput,
    SummaryStatus,
};

/// Candidate models for the summary call, in preference order.
pub const DEFAULT_SUMMARY_MODELS: [&str; 2] = ["gemini-3.1-pro-preview", "gemini-2.5-pro"];

/// Produces a [`StrategyReport`] from partitioned annotated items.
pub struct StrategySynthesizer {
    /// `None` means external calls are disabled.
    service: Option<Arc<dyn AnnotationService>>,
    models: Vec<String>,
    retry: RetryConfig,
    language: String,
}

impl StrategySynthesizer {
    pub fn new(service: Arc<dyn AnnotationService>) -> Self {
        Self {
            service: Some(service),
            models: DEFAULT_SUMMARY_MODELS.map(String::from).to_vec(),
            retry: RetryConfig::default(),
            language: super::remote::DEFAULT_OUTPUT_LANGUAGE.to_string(),
        }
    }

    /// A synthesizer that always returns the placeholder.
    pub fn offline() -> Self {
        Self {
            service: None,
            models: Vec::new(),
            retry: RetryConfig::default(),
            language: super::remote::DEFAULT_OUTPUT_LANGUAGE.to_string(),
        }
    }

    pub fn models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub async fn synthesize<I: Item>(&self, channels: &[ChannelBatch<'_, I>]) -> StrategyReport {
        info!(channels = channels.len(), "generating strategy summary");

        let Some(service) = &self.service else {
            info!("offline mode, returning placeholder summary");
            return placeholder();
        };
        if channels.iter().all(|c| c.items.is_empty()) {
            info!("no annotated items, returning placeholder summary");
            return placeholder();
        }
        let Some(digest) = build_digest(channels) else {
            info!("no genuine annotations to summarise, returning placeholder summary");
            return placeholder();
        };

        let request = InferenceRequest::new(StrategySummary::response_schema())
            .text(summary_prompt(&digest, &self.language));
        let request = &request;

        let result = invoke_with_fallback(&self.retry, &self.models, "summarize", move |model| {
            service.generate(model, request)
        })
        .await
        .and_then(|raw| StrategySummary::decode(&raw));

        match result {
            Ok(summary) => {
                metrics::counter!(telemetry::SUMMARIES_TOTAL, "status" => SummaryStatus::Computed.as_str())
                    .increment(1);
                StrategyReport {
                    summary,
                    status: SummaryStatus::Computed,
                }
            }
            Err(e) => {
                error!(error = %e, "strategy summary failed, returning placeholder");
                placeholder()
            }
        }
    }
}

fn placeholder() -> StrategyReport {
    metrics::counter!(telemetry::SUMMARIES_TOTAL, "status" => SummaryStatus::Placeholder.as_str())
        .increment(1);
    StrategyReport::placeholder()
}

/// Format each channel's genuine annotations in rank order.
///
/// Degraded items are skipped so placeholders never feed the summary.
/// Returns `None` when no channel has a genuine annotation.
pub fn build_digest<I: Item>(channels: &[ChannelBatch<'_, I>]) -> Option<String> {
    let mut any = false;
    let sections: Vec<String> = channels
        .iter()
        .map(|channel| {
            let entries: Vec<String> = channel
                .items
                .iter()
                .filter_map(|annotated| {
                    let annotation = annotated.genuine_annotation()?;
                    Some(format!(
                        "{}\nanalysis: {}",
                        annotated.item.digest_label(),
                        annotation.compact()
                    ))
                })
                .collect();
            any |= !entries.is_empty();
            format!("[{} top creatives]\n{}", channel.name, entries.join("\n\n"))
        })
        .collect();

    any.then(|| sections.join("\n\n"))
}

/// Build the summary prompt around a digest.
pub fn summary_prompt(digest: &str, language: &str) -> String {
    format!(
        "You are the user-acquisition strategy director for a mobile strategy (SLG) game \
         publisher. Below are structured analyses of this week's top-performing video ads in \
         the US market, grouped by ad channel.\n\n\
         [Creative analyses]\n{digest}\n\n\
         [Your task]\n\
         Read the individual analyses and write a concise, insightful summary for next week's \
         planning meeting. Higher-ranked creatives better represent what currently works on \
         their channel; note where the channels differ in approach.\n\
         Answer as pure JSON, written entirely in {language}, with exactly these fields:\n\
         1. hit_patterns: the mechanisms shared by the winning creatives\n\
         2. competitor_tactics: how leading competitors are shifting or innovating, and \
         whether channels are played differently\n\
         3. actionable_advice: concrete creative directions our art and UA teams should test \
         next week\n"
    )
}
