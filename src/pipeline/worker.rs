//! Annotation worker: cache lookup, remote call, write-through, degradation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::cache::AnnotationCache;
use crate::telemetry;
use crate::types::{AnnotatedItem, AnnotationResult, AnnotationStatus, Item};
use crate::{HuginnError, Result};

/// Produces an annotation for one item.
///
/// [`RemoteAnnotator`](super::RemoteAnnotator) is the production
/// implementation; [`OfflineAnnotator`] makes no external calls at all.
#[async_trait]
pub trait ItemAnnotator: Send + Sync {
    async fn annotate(&self, item: &dyn Item) -> Result<AnnotationResult>;
}

/// Annotator for runs with external calls disabled.
///
/// Always fails with [`HuginnError::Offline`], so cache hits are still
/// served but every miss degrades without touching the network.
pub struct OfflineAnnotator;

#[async_trait]
impl ItemAnnotator for OfflineAnnotator {
    async fn annotate(&self, _item: &dyn Item) -> Result<AnnotationResult> {
        Err(HuginnError::Offline)
    }
}

/// Per-item orchestration shared by every scheduler worker.
pub struct AnnotationWorker {
    cache: Arc<AnnotationCache>,
    annotator: Arc<dyn ItemAnnotator>,
}

impl AnnotationWorker {
    pub fn new(cache: Arc<AnnotationCache>, annotator: Arc<dyn ItemAnnotator>) -> Self {
        Self { cache, annotator }
    }

    pub fn cache(&self) -> &Arc<AnnotationCache> {
        &self.cache
    }

    /// Annotate one item. Never fails: remote failures become a degraded item.
    pub async fn process<I: Item + Clone>(&self, item: &I) -> AnnotatedItem<I> {
        let identity = item.identity();

        let annotated = if let Some(hit) = self.cache.get(identity) {
            info!(identity, "using cached annotation");
            AnnotatedItem::cached(item.clone(), hit)
        } else {
            match self.annotator.annotate(item).await {
                Ok(result) => {
                    self.cache.put(identity, result.clone());
                    info!(identity, "annotation computed");
                    AnnotatedItem::computed(item.clone(), result)
                }
                Err(HuginnError::Offline) => {
                    debug!(identity, "offline mode, substituting placeholder");
                    AnnotatedItem::degraded(item.clone())
                }
                Err(e) => {
                    error!(identity, error = %e, "annotation failed, substituting placeholder");
                    AnnotatedItem::degraded(item.clone())
                }
            }
        };

        record_outcome(annotated.status);
        annotated
    }
}

pub(crate) fn record_outcome(status: AnnotationStatus) {
    metrics::counter!(telemetry::ANNOTATIONS_TOTAL, "status" => status.as_str()).increment(1);
}
