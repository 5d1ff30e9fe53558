//! Builder for configuring pipeline instances

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::Pipeline;
use super::remote::{
    DEFAULT_ANNOTATION_MODELS, DEFAULT_OUTPUT_LANGUAGE, PollConfig, RemoteAnnotator,
};
use super::scheduler::DEFAULT_CONCURRENCY;
use super::summary::{DEFAULT_SUMMARY_MODELS, StrategySynthesizer};
use super::worker::{AnnotationWorker, ItemAnnotator, OfflineAnnotator};
use crate::cache::AnnotationCache;
use crate::providers::fetch::HttpFetcher;
use crate::providers::retry::RetryConfig;
use crate::providers::traits::{AnnotationService, ContentFetcher};
use crate::{HuginnError, Result};

/// Main entry point for creating pipeline instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring pipeline instances.
pub struct HuginnBuilder {
    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    gemini_key: Option<String>,
    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    gemini_base_url: Option<String>,
    service: Option<Arc<dyn AnnotationService>>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    annotator: Option<Arc<dyn ItemAnnotator>>,
    cache_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    concurrency: usize,
    retry: RetryConfig,
    poll: PollConfig,
    annotation_models: Vec<String>,
    summary_models: Vec<String>,
    language: String,
    offline: bool,
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            gemini_key: None,
            gemini_base_url: None,
            service: None,
            fetcher: None,
            annotator: None,
            cache_path: None,
            scratch_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            annotation_models: DEFAULT_ANNOTATION_MODELS.map(String::from).to_vec(),
            summary_models: DEFAULT_SUMMARY_MODELS.map(String::from).to_vec(),
            language: DEFAULT_OUTPUT_LANGUAGE.to_string(),
            offline: false,
        }
    }

    /// Use the Gemini API with this key.
    #[cfg(feature = "gemini")]
    pub fn gemini(mut self, api_key: impl Into<String>) -> Self {
        self.gemini_key = Some(api_key.into());
        self
    }

    /// Point the Gemini client at a different base URL.
    #[cfg(feature = "gemini")]
    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = Some(url.into());
        self
    }

    /// Use a custom annotation service (takes precedence over Gemini).
    pub fn service(mut self, service: Arc<dyn AnnotationService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Use a custom raw content fetcher (default: [`HttpFetcher`]).
    pub fn fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the whole per-item remote path.
    pub fn annotator(mut self, annotator: Arc<dyn ItemAnnotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Persist the annotation cache at this path (default: in-memory only).
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Directory for downloaded content (default: the system temp dir).
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Maximum items annotated in parallel (default: 15).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
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

    pub fn annotation_models(mut self, models: Vec<String>) -> Self {
        self.annotation_models = models;
        self
    }

    pub fn summary_models(mut self, models: Vec<String>) -> Self {
        self.summary_models = models;
        self
    }

    /// Language the service writes annotations and summaries in.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Disable every external call.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if self.concurrency == 0 {
            return Err(HuginnError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.poll.interval.is_zero() {
            return Err(HuginnError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let cache = Arc::new(match &self.cache_path {
            Some(path) => AnnotationCache::open(path),
            None => AnnotationCache::in_memory(),
        });

        if self.offline {
            info!("external calls disabled, pipeline running offline");
            let worker = AnnotationWorker::new(cache, Arc::new(OfflineAnnotator));
            return Ok(Pipeline::new(
                worker,
                StrategySynthesizer::offline(),
                self.concurrency,
                true,
            ));
        }

        let service = self.resolve_service()?;
        let annotator: Arc<dyn ItemAnnotator> = match self.annotator {
            Some(annotator) => annotator,
            None => {
                let fetcher: Arc<dyn ContentFetcher> = match self.fetcher {
                    Some(fetcher) => fetcher,
                    None => Arc::new(HttpFetcher::new()?),
                };
                let mut remote = RemoteAnnotator::new(service.clone(), fetcher)
                    .models(self.annotation_models)
                    .retry(self.retry.clone())
                    .poll(self.poll)
                    .language(self.language.clone());
                if let Some(dir) = self.scratch_dir {
                    remote = remote.scratch_dir(dir);
                }
                Arc::new(remote)
            }
        };

        let synthesizer = StrategySynthesizer::new(service)
            .models(self.summary_models)
            .retry(self.retry)
            .language(self.language);

        Ok(Pipeline::new(
            AnnotationWorker::new(cache, annotator),
            synthesizer,
            self.concurrency,
            false,
        ))
    }

    fn resolve_service(&self) -> Result<Arc<dyn AnnotationService>> {
        if let Some(service) = &self.service {
            return Ok(service.clone());
        }

        #[cfg(feature = "gemini")]
        if let Some(key) = &self.gemini_key {
            use crate::providers::GeminiClient;
            let client = match &self.gemini_base_url {
                Some(url) => GeminiClient::with_base_url(key.clone(), url.clone())?,
                None => GeminiClient::new(key.clone())?,
            };
            return Ok(Arc::new(client));
        }

        Err(HuginnError::Configuration(
            "no annotation service configured (missing API key?)".to_string(),
        ))
    }
}
