//! Work items handed to the annotation pipeline

use serde::{Deserialize, Serialize};

/// A unit of work for the annotation pipeline.
///
/// Items are immutable once handed over. The pipeline only needs a stable
/// identity (used as the cache key) and the location of the raw content;
/// everything else is context for prompts and digests.
pub trait Item: Send + Sync {
    /// Stable cache key for this item.
    fn identity(&self) -> &str;

    /// Location of the raw content (e.g. a CDN URL).
    fn payload_uri(&self) -> &str;

    /// MIME type of the raw content.
    fn mime_type(&self) -> &str {
        "video/mp4"
    }

    /// Free-form context lines added to the annotation prompt.
    fn prompt_context(&self) -> Vec<String> {
        Vec::new()
    }

    /// Short label used when this item appears in a summary digest.
    fn digest_label(&self) -> String {
        self.identity().to_string()
    }
}

/// A ranked video ad creative from the ad-intelligence source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCreative {
    pub ad_id: String,
    pub app_name: String,
    /// Ad network the creative ran on (e.g. "Applovin").
    pub ad_network: String,
    /// 1-based rank within its network.
    pub rank: u32,
    #[serde(default)]
    pub first_seen_at: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl Item for AdCreative {
    fn identity(&self) -> &str {
        &self.video_url
    }

    fn payload_uri(&self) -> &str {
        &self.video_url
    }

    fn prompt_context(&self) -> Vec<String> {
        vec![
            format!("Game: {}", self.app_name),
            format!("Ad network: {}", self.ad_network),
        ]
    }

    fn digest_label(&self) -> String {
        format!(
            "[{} rank {}] game: {}",
            self.ad_network, self.rank, self.app_name
        )
    }
}
