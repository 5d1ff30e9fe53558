//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: retried call site ("annotate" | "summarize")
//! - `model`: candidate model identifier
//! - `status`: item outcome ("cached" | "computed" | "degraded")
//! - `step`: remote lifecycle step ("fetch" | "upload" | "poll" | "infer" | "release")

/// Total items that left the annotation worker.
///
/// Labels: `status`.
pub const ANNOTATIONS_TOTAL: &str = "huginn_annotations_total";

/// Total cache hits in the annotation cache.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses in the annotation cache.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total cache persist failures (logged and swallowed).
pub const CACHE_PERSIST_FAILURES_TOTAL: &str = "huginn_cache_persist_failures_total";

/// Total backoff retries (rate-limit or server error rounds).
///
/// Labels: `operation`, `model`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total immediate fallbacks to the next candidate model.
///
/// Labels: `operation`, `model` (the model that failed).
pub const MODEL_FALLBACKS_TOTAL: &str = "huginn_model_fallbacks_total";

/// Duration of one remote lifecycle step in seconds.
///
/// Labels: `step`.
pub const REMOTE_STEP_DURATION_SECONDS: &str = "huginn_remote_step_duration_seconds";

/// Total remote release failures (logged, never escalated).
///
/// Labels: `resource` ("remote" | "local").
pub const RELEASE_FAILURES_TOTAL: &str = "huginn_release_failures_total";

/// Total strategy summary requests.
///
/// Labels: `status` ("computed" | "placeholder").
pub const SUMMARIES_TOTAL: &str = "huginn_summaries_total";
