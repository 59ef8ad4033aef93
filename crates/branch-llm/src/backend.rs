use std::pin::Pin;

use async_trait::async_trait;
use branch_core::{BranchSummaryRequest, BranchTurnRequest, ChatRequest};
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;

/// Raw response body of a successful request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The three logical requests a conversation client issues.
///
/// Implementations return the body stream only for successful responses;
/// any non-success status or missing body is an error before streaming
/// starts. No implementation retries.
#[async_trait]
pub trait BranchBackend: Send + Sync {
    /// Reply to the main conversation.
    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Reply to the latest user turn of a branch.
    async fn branch_turn(&self, request: &BranchTurnRequest) -> Result<ByteStream>;

    /// Summarize a branch for merging.
    async fn branch_summary(&self, request: &BranchSummaryRequest) -> Result<ByteStream>;
}
