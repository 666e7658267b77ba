//! Execution: target metadata, plan compilation, and row materialization.

use async_trait::async_trait;

use crate::error::MapResult;

pub mod compile;
pub mod entity;
pub mod multi;
pub mod resolve;
pub mod row;

/// A pull-based producer of materialized items.
///
/// [`Fetch`](crate::db::Fetch) implements this for lazy, row-at-a-time
/// result consumption.
#[async_trait]
pub trait Executor: Send {
    type Item;

    /// The next materialized item, or `None` once the result is exhausted.
    async fn next(&mut self) -> MapResult<Option<Self::Item>>;
}
