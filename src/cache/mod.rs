//! Caching subsystem.
//!
//! - [`AnnotationCache`]: durable identity → annotation map, persisted as a
//!   single flat JSON object. Cumulative across runs: no TTL, no eviction,
//!   last writer wins. Shared by every annotation worker in a batch.

mod store;

pub use store::AnnotationCache;
