//! Remote annotation client: the per-item upload → poll → infer → release
//! lifecycle.
//!
//! Every resource the lifecycle acquires is released on every exit path:
//!
//! - the local download lives in a [`TempPath`], closed explicitly once the
//!   remote steps finish (and removed by its destructor if the future is
//!   dropped first);
//! - the uploaded asset is held by an [`AssetLease`], released explicitly
//!   after polling/inference regardless of their outcome, with a
//!   background delete from `Drop` as the last resort.
//!
//! Neither resource is ever shared with another worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempPath;
use tracing::{debug, warn};

use super::worker::ItemAnnotator;
use crate::providers::retry::{RetryConfig, invoke_with_fallback};
use crate::providers::traits::{AnnotationService, ContentFetcher};
use crate::telemetry;
use crate::types::{
    AnnotationResult, AssetState, InferenceRequest, Item, RemoteAsset, StructuredOutput,
};
use crate::{HuginnError, Result};

/// Candidate models for per-item annotation, in preference order.
pub const DEFAULT_ANNOTATION_MODELS: [&str; 2] = ["gemini-3-flash-preview", "gemini-2.5-flash"];

/// Default language the annotation service answers in.
pub const DEFAULT_OUTPUT_LANGUAGE: &str = "Simplified Chinese";

/// Floor applied to [`PollConfig::interval`] so a waiting worker never spins.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to wait for an uploaded asset to become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between state checks. Default: 5s. Never shorter than
    /// [`MIN_POLL_INTERVAL`].
    pub interval: Duration,
    /// Give up once this much time has been spent waiting. Default: 180s.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(180),
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// Annotates one item at a time against a remote [`AnnotationService`].
pub struct RemoteAnnotator {
    service: Arc<dyn AnnotationService>,
    fetcher: Arc<dyn ContentFetcher>,
    models: Vec<String>,
    retry: RetryConfig,
    poll: PollConfig,
    language: String,
    scratch_dir: Option<PathBuf>,
}

impl RemoteAnnotator {
    pub fn new(service: Arc<dyn AnnotationService>, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            service,
            fetcher,
            models: DEFAULT_ANNOTATION_MODELS.map(String::from).to_vec(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            language: DEFAULT_OUTPUT_LANGUAGE.to_string(),
            scratch_dir: None,
        }
    }

    /// Replace the candidate model list.
    pub fn models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn poll(mut self, config: PollConfig) -> Self {
        self.poll = config;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Directory for downloads (default: the system temp dir).
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Run the full lifecycle for one item.
    pub async fn annotate_item(&self, item: &dyn Item) -> Result<AnnotationResult> {
        let staged = self.stage(item).await?;
        let result = self.annotate_staged(item, &staged).await;
        release_local(staged);
        result
    }

    /// Step 1: download the raw content into a scratch file.
    async fn stage(&self, item: &dyn Item) -> Result<TempPath> {
        let path = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("huginn-").suffix(extension_for(item.mime_type()));
            match &self.scratch_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            }
            .into_temp_path()
        };

        let started = Instant::now();
        let bytes = self.fetcher.fetch_to(item.payload_uri(), &path).await?;
        record_step("fetch", started);
        debug!(identity = item.identity(), bytes, "content staged");
        Ok(path)
    }

    /// Steps 2–4 against an already staged file.
    async fn annotate_staged(&self, item: &dyn Item, staged: &Path) -> Result<AnnotationResult> {
        let started = Instant::now();
        let asset = self
            .service
            .upload(staged, item.mime_type(), &display_name(item.payload_uri()))
            .await?;
        record_step("upload", started);
        debug!(identity = item.identity(), asset = %asset.name, "asset uploaded");

        let lease = AssetLease::new(self.service.clone(), asset);
        let result = self.infer(item, lease.asset()).await;
        lease.release().await;
        result
    }

    async fn infer(&self, item: &dyn Item, asset: &RemoteAsset) -> Result<AnnotationResult> {
        let started = Instant::now();
        let ready = self.await_ready(asset.clone()).await?;
        record_step("poll", started);

        let request = InferenceRequest::new(AnnotationResult::response_schema())
            .file(item.mime_type(), ready.uri)
            .text(annotation_prompt(item, &self.language))
            .low_media_resolution(true);
        let request = &request;
        let service = &self.service;

        let started = Instant::now();
        let raw = invoke_with_fallback(&self.retry, &self.models, "annotate", move |model| {
            service.generate(model, request)
        })
        .await?;
        record_step("infer", started);

        AnnotationResult::decode(&raw)
    }

    /// Step 3: poll until the asset is ready, failed, or the wait bound is hit.
    async fn await_ready(&self, mut asset: RemoteAsset) -> Result<RemoteAsset> {
        let started = tokio::time::Instant::now();
        let pause = self.poll.interval.max(MIN_POLL_INTERVAL);
        loop {
            let waited = started.elapsed();
            match asset.state {
                AssetState::Ready => return Ok(asset),
                AssetState::Failed => return Err(HuginnError::ProcessingFailed(asset.name)),
                AssetState::Pending if waited >= self.poll.max_wait => {
                    return Err(HuginnError::ProcessingTimeout {
                        asset: asset.name,
                        waited,
                    });
                }
                AssetState::Pending => {
                    tokio::time::sleep(pause).await;
                    asset = self.service.asset(&asset.name).await?;
                }
            }
        }
    }
}

#[async_trait]
impl ItemAnnotator for RemoteAnnotator {
    async fn annotate(&self, item: &dyn Item) -> Result<AnnotationResult> {
        self.annotate_item(item).await
    }
}

/// Exclusive ownership of one uploaded asset.
///
/// Call [`release()`](Self::release) on every normal path. If the lease is
/// dropped unreleased (future cancelled, panic), `Drop` schedules the delete
/// on the current runtime instead.
struct AssetLease {
    service: Arc<dyn AnnotationService>,
    asset: RemoteAsset,
    released: bool,
}

impl AssetLease {
    fn new(service: Arc<dyn AnnotationService>, asset: RemoteAsset) -> Self {
        Self {
            service,
            asset,
            released: false,
        }
    }

    fn asset(&self) -> &RemoteAsset {
        &self.asset
    }

    async fn release(mut self) {
        // Marked first so a cancelled delete is not retried from Drop.
        self.released = true;
        let started = Instant::now();
        match self.service.delete_asset(&self.asset.name).await {
            Ok(()) => debug!(asset = %self.asset.name, "remote asset released"),
            Err(e) => {
                metrics::counter!(telemetry::RELEASE_FAILURES_TOTAL, "resource" => "remote")
                    .increment(1);
                warn!(asset = %self.asset.name, error = %e, "failed to delete remote asset");
            }
        }
        record_step("release", started);
    }
}

impl Drop for AssetLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let name = self.asset.name.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = self.service.clone();
                handle.spawn(async move {
                    if let Err(e) = service.delete_asset(&name).await {
                        warn!(asset = %name, error = %e, "failed to delete abandoned remote asset");
                    }
                });
            }
            Err(_) => warn!(asset = %name, "remote asset leaked: no runtime to release it"),
        }
    }
}

fn release_local(staged: TempPath) {
    let path = staged.to_path_buf();
    if let Err(e) = staged.close() {
        metrics::counter!(telemetry::RELEASE_FAILURES_TOTAL, "resource" => "local").increment(1);
        warn!(path = %path.display(), error = %e, "failed to remove scratch file");
    }
}

fn record_step(step: &'static str, started: Instant) {
    metrics::histogram!(telemetry::REMOTE_STEP_DURATION_SECONDS, "step" => step)
        .record(started.elapsed().as_secs_f64());
}

/// Last path segment of the payload URI, reduced to header-safe characters.
fn display_name(uri: &str) -> String {
    let segment = uri
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
        .unwrap_or("asset");
    let name: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(64)
        .collect();
    if name.is_empty() {
        "asset".to_string()
    } else {
        name
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        _ => ".bin",
    }
}

/// Build the per-item annotation prompt.
pub fn annotation_prompt(item: &dyn Item, language: &str) -> String {
    let mut prompt = String::from(
        "You are a senior analyst of mobile game video advertising, specialising in \
         strategy (SLG) titles. Analyse the attached video ad.\n",
    );
    for line in item.prompt_context() {
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nDescribe the ad along exactly these five dimensions and answer as pure JSON, \
         written entirely in {language}. Keep every value extremely concise: never more \
         than 50 characters.\n\
         1. hook_design: how the first 3 seconds grab attention\n\
         2. emotional_appeal: the emotion it evokes (anxiety, relief, frustration, ...)\n\
         3. content_structure: the order of story beats or gameplay shown\n\
         4. wow_factor: the core visual spectacle or most satisfying moment\n\
         5. copywriting_features: on-screen text, voice-over lines and the call to action\n"
    ));
    prompt
}
