//! The concurrent annotation pipeline.
//!
//! ```text
//! items ──► annotate_all (K workers) ──► AnnotationWorker ──┬─► AnnotationCache (hit)
//!                                                           └─► RemoteAnnotator
//!                                                                 fetch → upload → poll
//!                                                                 → infer (retry) → release
//! ordered Vec<AnnotatedItem> ──► StrategySynthesizer ──► StrategyReport
//! ```

mod builder;
mod remote;
mod scheduler;
mod summary;
mod worker;

use std::sync::Arc;

pub use builder::{Huginn, HuginnBuilder};
pub use remote::{
    DEFAULT_ANNOTATION_MODELS, DEFAULT_OUTPUT_LANGUAGE, MIN_POLL_INTERVAL, PollConfig,
    RemoteAnnotator, annotation_prompt,
};
pub use scheduler::{DEFAULT_CONCURRENCY, annotate_all};
pub use summary::{DEFAULT_SUMMARY_MODELS, StrategySynthesizer, build_digest, summary_prompt};
pub use worker::{AnnotationWorker, ItemAnnotator, OfflineAnnotator};

use crate::cache::AnnotationCache;
use crate::types::{AnnotatedItem, ChannelBatch, Item, StrategyReport};

/// A configured pipeline: shared cache, annotator, and summary synthesizer.
///
/// Created via [`Huginn::builder()`].
pub struct Pipeline {
    worker: Arc<AnnotationWorker>,
    synthesizer: StrategySynthesizer,
    concurrency: usize,
    offline: bool,
}

impl Pipeline {
    pub(crate) fn new(
        worker: AnnotationWorker,
        synthesizer: StrategySynthesizer,
        concurrency: usize,
        offline: bool,
    ) -> Self {
        Self {
            worker: Arc::new(worker),
            synthesizer,
            concurrency,
            offline,
        }
    }

    /// Annotate a batch; output order matches input order.
    pub async fn annotate<I>(&self, items: Vec<I>) -> Vec<AnnotatedItem<I>>
    where
        I: Item + Clone + 'static,
    {
        annotate_all(self.worker.clone(), items, self.concurrency).await
    }

    /// Synthesize the strategy summary over partitioned results.
    pub async fn summarize<I: Item>(&self, channels: &[ChannelBatch<'_, I>]) -> StrategyReport {
        self.synthesizer.synthesize(channels).await
    }

    pub fn cache(&self) -> &AnnotationCache {
        self.worker.cache()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }
}
