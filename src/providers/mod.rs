//! Remote service clients and the retry coordinator.
//!
//! - [`traits`]: the seams the pipeline depends on
//! - [`retry`]: model fallback and backoff around any inference call
//! - [`gemini`]: Gemini API implementation of [`AnnotationService`]
//! - [`fetch`]: HTTP implementation of [`ContentFetcher`]

pub mod fetch;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod retry;
pub mod traits;

pub use fetch::HttpFetcher;
#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
pub use retry::{RetryConfig, invoke_with_fallback};
pub use traits::{AnnotationService, ContentFetcher};
