//! Service traits consumed by the annotation pipeline.
//!
//! The pipeline never talks HTTP directly; it goes through two narrow seams:
//!
//! - [`AnnotationService`]: the remote generative-AI service (asset upload,
//!   status poll, delete, schema-constrained inference).
//! - [`ContentFetcher`]: downloads an item's raw content to a local file.
//!
//! # Failure Semantics
//!
//! Implementations report failures with typed errors so the retry
//! coordinator can classify them:
//! - `ModelNotFound` / `ModelNotAvailable`: try the next candidate model
//! - `RateLimited` / `Server`: back off, then restart the model list
//! - `AuthenticationFailed`: terminal, no model can succeed
//! - anything else: try the next candidate model

use std::path::Path;

use async_trait::async_trait;

use crate::Result;
use crate::types::{InferenceRequest, RemoteAsset};

/// Remote annotation service.
#[async_trait]
pub trait AnnotationService: Send + Sync {
    /// Service name for logging/debugging.
    fn name(&self) -> &str;

    /// Upload a local file, returning an asset that is usually still pending.
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str)
    -> Result<RemoteAsset>;

    /// Fetch the current state of an uploaded asset.
    async fn asset(&self, name: &str) -> Result<RemoteAsset>;

    /// Delete an uploaded asset.
    async fn delete_asset(&self, name: &str) -> Result<()>;

    /// Run one schema-constrained inference call against `model`.
    ///
    /// Returns the raw structured text; decoding is the caller's job.
    async fn generate(&self, model: &str, request: &InferenceRequest) -> Result<String>;
}

/// Raw content downloader.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Download `uri` into `dest`, returning the number of bytes written.
    ///
    /// Single attempt: failures surface as [`HuginnError::Fetch`](crate::HuginnError::Fetch).
    async fn fetch_to(&self, uri: &str, dest: &Path) -> Result<u64>;
}
