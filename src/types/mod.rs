//! Public types for the Huginn API.

mod annotation;
mod inference;
mod item;
mod summary;

pub use annotation::{AnnotatedItem, AnnotationResult, AnnotationStatus, StructuredOutput};
pub use inference::{AssetState, InferenceRequest, Part, RemoteAsset};
pub use item::{AdCreative, Item};
pub use summary::{ChannelBatch, StrategyReport, StrategySummary, SummaryStatus};
