//! Worker and scheduler behaviour: ordering, bounded concurrency, cache
//! write-through, and containment of per-item failures.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use huginn::pipeline::{AnnotationWorker, ItemAnnotator, annotate_all};
use huginn::{
    AnnotationCache, AnnotationResult, AnnotationStatus, Huginn, HuginnError, Item, PollConfig,
    Result,
};

/// `"name@ms"` identities make the fake annotator sleep for `ms`.
#[derive(Debug, Clone, PartialEq)]
struct Ad {
    id: String,
}

impl Ad {
    fn new(id: &str) -> Self {
        Self { id: id.into() }
    }
}

impl Item for Ad {
    fn identity(&self) -> &str {
        &self.id
    }
    fn payload_uri(&self) -> &str {
        &self.id
    }
}

fn annotation(tag: &str) -> AnnotationResult {
    AnnotationResult {
        hook_design: format!("hook {tag}"),
        emotional_appeal: "tension".into(),
        content_structure: "fail, upgrade, win".into(),
        wow_factor: "big explosion".into(),
        copywriting_features: "Can you beat it?".into(),
    }
}

/// Annotator that sleeps per item, fails or panics on request, and tracks
/// how many calls are in flight.
#[derive(Default)]
struct FakeAnnotator {
    fail: HashSet<String>,
    panic_on: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeAnnotator {
    fn failing(ids: &[&str]) -> Self {
        Self {
            fail: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn panicking(ids: &[&str]) -> Self {
        Self {
            panic_on: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemAnnotator for FakeAnnotator {
    async fn annotate(&self, item: &dyn Item) -> Result<AnnotationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let id = item.identity().to_string();
        let latency = id
            .rsplit_once('@')
            .and_then(|(_, ms)| ms.parse().ok())
            .unwrap_or(1);
        tokio::time::sleep(Duration::from_millis(latency)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.contains(&id) {
            panic!("annotator blew up on {id}");
        }
        if self.fail.contains(&id) {
            return Err(HuginnError::Upload(format!("upload rejected for {id}")));
        }
        Ok(annotation(&id))
    }
}

fn worker(cache: AnnotationCache, annotator: Arc<FakeAnnotator>) -> Arc<AnnotationWorker> {
    Arc::new(AnnotationWorker::new(Arc::new(cache), annotator))
}

fn ids<I: Item>(items: &[huginn::AnnotatedItem<I>]) -> Vec<String> {
    items.iter().map(|a| a.item.identity().to_string()).collect()
}

#[tokio::test]
async fn empty_batch_yields_empty_output() {
    let annotator = Arc::new(FakeAnnotator::default());
    let worker = worker(AnnotationCache::in_memory(), annotator.clone());

    let out = annotate_all::<Ad>(worker, Vec::new(), 15).await;

    assert!(out.is_empty());
    assert_eq!(annotator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn output_order_matches_input_not_completion() {
    // First item is slowest, last is fastest.
    let items: Vec<Ad> = [50, 40, 30, 20, 10]
        .iter()
        .enumerate()
        .map(|(i, ms)| Ad::new(&format!("ad{i}@{ms}")))
        .collect();
    let expected: Vec<String> = items.iter().map(|a| a.id.clone()).collect();
    let annotator = Arc::new(FakeAnnotator::default());

    let out = annotate_all(worker(AnnotationCache::in_memory(), annotator), items.clone(), 5).await;

    assert_eq!(ids(&out), expected);
    for (annotated, item) in out.iter().zip(&items) {
        assert_eq!(&annotated.item, item);
        assert_eq!(annotated.status, AnnotationStatus::Computed);
        assert_eq!(
            annotated.annotation.as_ref().unwrap().hook_design,
            format!("hook {}", item.id)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn in_flight_work_never_exceeds_bound() {
    let items: Vec<Ad> = (0..12).map(|i| Ad::new(&format!("ad{i}@10"))).collect();
    let annotator = Arc::new(FakeAnnotator::default());

    let out = annotate_all(
        worker(AnnotationCache::in_memory(), annotator.clone()),
        items,
        3,
    )
    .await;

    assert_eq!(out.len(), 12);
    assert_eq!(annotator.calls(), 12);
    assert_eq!(annotator.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn pool_larger_than_batch_still_completes() {
    let items = vec![Ad::new("only@5")];
    let annotator = Arc::new(FakeAnnotator::default());

    let out = annotate_all(worker(AnnotationCache::in_memory(), annotator), items, 15).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].status, AnnotationStatus::Computed);
}

#[tokio::test(start_paused = true)]
async fn cached_computed_and_degraded_in_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("analysis_cache.json");

    let seeded = AnnotationCache::open(&cache_path);
    seeded.put("A2", annotation("seeded"));
    drop(seeded);

    let annotator = Arc::new(FakeAnnotator::failing(&["A3"]));
    let worker = worker(AnnotationCache::open(&cache_path), annotator.clone());
    let items = vec![Ad::new("A1"), Ad::new("A2"), Ad::new("A3")];

    let out = annotate_all(worker.clone(), items, 15).await;

    assert_eq!(ids(&out), vec!["A1", "A2", "A3"]);
    assert_eq!(out[0].status, AnnotationStatus::Computed);
    assert_eq!(out[1].status, AnnotationStatus::Cached);
    assert_eq!(out[1].annotation.as_ref().unwrap().hook_design, "hook seeded");
    assert_eq!(out[2].status, AnnotationStatus::Degraded);
    assert_eq!(out[2].annotation, Some(AnnotationResult::placeholder()));
    // The cached item never reached the annotator.
    assert_eq!(annotator.calls(), 2);

    let reopened = AnnotationCache::open(&cache_path);
    assert_eq!(reopened.identities(), vec!["A1", "A2"]);
    assert_eq!(reopened.get("A2").unwrap().hook_design, "hook seeded");
    assert!(reopened.get("A3").is_none());
}

#[tokio::test(start_paused = true)]
async fn second_run_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("analysis_cache.json");
    let annotator = Arc::new(FakeAnnotator::default());

    let first = annotate_all(
        worker(AnnotationCache::open(&cache_path), annotator.clone()),
        vec![Ad::new("A1")],
        15,
    )
    .await;
    let second = annotate_all(
        worker(AnnotationCache::open(&cache_path), annotator.clone()),
        vec![Ad::new("A1")],
        15,
    )
    .await;

    assert_eq!(annotator.calls(), 1);
    assert_eq!(first[0].status, AnnotationStatus::Computed);
    assert_eq!(second[0].status, AnnotationStatus::Cached);
    assert_eq!(first[0].annotation, second[0].annotation);
}

#[tokio::test(start_paused = true)]
async fn panic_is_contained_to_its_item() {
    let annotator = Arc::new(FakeAnnotator::panicking(&["boom"]));
    let items = vec![Ad::new("a"), Ad::new("boom"), Ad::new("c")];

    let out = annotate_all(
        worker(AnnotationCache::in_memory(), annotator.clone()),
        items,
        2,
    )
    .await;

    assert_eq!(ids(&out), vec!["a", "boom", "c"]);
    assert_eq!(out[0].status, AnnotationStatus::Computed);
    assert_eq!(out[1].status, AnnotationStatus::Degraded);
    assert!(out[1].annotation.is_none());
    assert_eq!(out[2].status, AnnotationStatus::Computed);
    assert_eq!(annotator.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn failures_are_not_cached() {
    let annotator = Arc::new(FakeAnnotator::failing(&["bad"]));
    let worker = worker(AnnotationCache::in_memory(), annotator);

    let out = annotate_all(worker.clone(), vec![Ad::new("bad"), Ad::new("good")], 15).await;

    assert_eq!(out[0].status, AnnotationStatus::Degraded);
    assert_eq!(worker.cache().identities(), vec!["good"]);
}

#[tokio::test]
async fn offline_pipeline_serves_hits_and_degrades_misses() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("analysis_cache.json");
    AnnotationCache::open(&cache_path).put("known", annotation("known"));

    let pipeline = Huginn::builder()
        .cache_path(&cache_path)
        .offline(true)
        .build()
        .unwrap();
    assert!(pipeline.is_offline());

    let out = pipeline
        .annotate(vec![Ad::new("known"), Ad::new("unknown")])
        .await;

    assert_eq!(out[0].status, AnnotationStatus::Cached);
    assert_eq!(out[1].status, AnnotationStatus::Degraded);
    assert_eq!(pipeline.cache().len(), 1);
}

#[tokio::test]
async fn injected_annotator_runs_through_pipeline() {
    let annotator = Arc::new(FakeAnnotator::default());
    let pipeline = Huginn::builder()
        .service(Arc::new(NoService))
        .annotator(annotator.clone())
        .concurrency(2)
        .build()
        .unwrap();

    let out = pipeline.annotate(vec![Ad::new("x"), Ad::new("y")]).await;

    assert!(out.iter().all(|a| a.status == AnnotationStatus::Computed));
    assert_eq!(annotator.calls(), 2);
    assert_eq!(pipeline.concurrency(), 2);
}

#[test]
fn missing_credentials_is_configuration_error() {
    let result = Huginn::builder().build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[test]
fn zero_concurrency_is_rejected() {
    let result = Huginn::builder().offline(true).concurrency(0).build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[test]
fn zero_poll_interval_is_rejected() {
    let result = Huginn::builder()
        .offline(true)
        .poll(PollConfig::new().interval(Duration::ZERO))
        .build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

/// Service that must never be reached.
struct NoService;

#[async_trait]
impl huginn::AnnotationService for NoService {
    fn name(&self) -> &str {
        "unreachable"
    }
    async fn upload(
        &self,
        _path: &std::path::Path,
        _mime: &str,
        _display: &str,
    ) -> Result<huginn::RemoteAsset> {
        unreachable!("upload")
    }
    async fn asset(&self, _name: &str) -> Result<huginn::RemoteAsset> {
        unreachable!("asset")
    }
    async fn delete_asset(&self, _name: &str) -> Result<()> {
        unreachable!("delete")
    }
    async fn generate(&self, _model: &str, _request: &huginn::InferenceRequest) -> Result<String> {
        unreachable!("generate")
    }
}
