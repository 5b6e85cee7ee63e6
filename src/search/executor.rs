use super::cancel::CancelToken;
use super::model::{Query, ResourceEntry};
use anyhow::Result;

/// Queries one target for resources matching a query.
///
/// Implementations are called concurrently from several workers, each with a
/// different target. They should return promptly once `cancel` fires instead
/// of retrying.
pub trait TargetExecutor: Send + Sync {
    /// Resource kind reported in warnings when a call fails.
    fn kind(&self) -> &str;

    fn execute(&self, cancel: &CancelToken, target: &str, query: &Query)
        -> Result<Vec<ResourceEntry>>;
}
