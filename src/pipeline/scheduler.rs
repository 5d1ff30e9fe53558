//! Bounded worker pool with index-tagged fan-in.
//!
//! `K` long-lived tasks pull the next unclaimed index from a shared cursor,
//! run the [`AnnotationWorker`] to completion, and send `(index, result)`
//! back over a channel. The collector places each result in its original
//! slot, so output order never depends on completion order.
//!
//! A panic inside one item is caught at the item boundary: the worker task
//! survives, the item is reported as degraded, and siblings are unaffected.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::worker::{AnnotationWorker, record_outcome};
use crate::HuginnError;
use crate::types::{AnnotatedItem, AnnotationStatus, Item};

/// Default number of concurrent annotation workers.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Annotate `items` with at most `concurrency` in flight.
///
/// Returns exactly `items.len()` results, `output[i]` belonging to
/// `items[i]`. Must run inside a tokio runtime; a multi-thread runtime gives
/// true parallelism across workers.
pub async fn annotate_all<I>(
    worker: Arc<AnnotationWorker>,
    items: Vec<I>,
    concurrency: usize,
) -> Vec<AnnotatedItem<I>>
where
    I: Item + Clone + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let pool_size = concurrency.clamp(1, total);
    info!(items = total, workers = pool_size, "starting concurrent annotation");

    let items: Arc<[I]> = items.into();
    let cursor = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, AnnotatedItem<I>)>();

    let mut workers = JoinSet::new();
    for _ in 0..pool_size {
        let worker = worker.clone();
        let items = items.clone();
        let cursor = cursor.clone();
        let tx = tx.clone();
        workers.spawn(async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };
                let annotated = AssertUnwindSafe(worker.process(item))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let err = HuginnError::WorkerPanicked(panic_message(panic.as_ref()));
                        error!(index, identity = item.identity(), error = %err, "item abandoned");
                        record_outcome(AnnotationStatus::Degraded);
                        AnnotatedItem::unannotated(item.clone())
                    });
                if tx.send((index, annotated)).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut slots: Vec<Option<AnnotatedItem<I>>> = (0..total).map(|_| None).collect();
    while let Some((index, annotated)) = rx.recv().await {
        slots[index] = Some(annotated);
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "annotation worker task failed");
        }
    }

    // Only reachable if a worker task died outside the per-item guard.
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or_else(|| AnnotatedItem::unannotated(items[index].clone())))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
