//! Huginn - concurrent annotation pipeline for ranked video ad creatives
//!
//! Each creative is downloaded, uploaded to a remote multimodal inference
//! service, annotated into a structured [`AnnotationResult`], and cached by
//! identity so later runs never pay for it again. A final call synthesizes a
//! cross-channel [`StrategySummary`] from the batch.
//!
//! Failures never abort a batch: an item whose remote path fails is returned
//! with a placeholder annotation, and a failed summary becomes a placeholder
//! report.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{AdCreative, ChannelBatch, Huginn};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let pipeline = Huginn::builder()
//!         .gemini("your-api-key")
//!         .cache_path("analysis_cache.json")
//!         .concurrency(15)
//!         .build()?;
//!
//!     let creatives: Vec<AdCreative> = Vec::new();
//!     let annotated = pipeline.annotate(creatives).await;
//!
//!     let report = pipeline
//!         .summarize(&[ChannelBatch::new("Applovin", &annotated)])
//!         .await;
//!     println!("{}", report.summary.hit_patterns);
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::AnnotationCache;
pub use error::{HuginnError, Result, RetryDisposition};
pub use pipeline::{Huginn, HuginnBuilder, Pipeline, PollConfig};
pub use providers::{AnnotationService, ContentFetcher, RetryConfig};
pub use version::{PKG_VERSION, version_string};

pub use types::{
    AdCreative, AnnotatedItem, AnnotationResult, AnnotationStatus, AssetState, ChannelBatch,
    InferenceRequest, Item, Part, RemoteAsset, StrategyReport, StrategySummary, StructuredOutput,
    SummaryStatus,
};
