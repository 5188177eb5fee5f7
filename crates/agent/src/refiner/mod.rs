//! Context refiners: stages that rewrite the refined timeline after each
//! tool round.
//!
//! The loop hands every refiner both timelines. The raw history is
//! append-only; whatever a refiner returns becomes the new refined view that
//! the next model call sees.

pub mod summarize;

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::error::RefinerError;
use relay_core::message::Message;
use relay_core::tool::Tool;

pub use summarize::{SummarizedContext, SummarizingRefiner};

/// A pluggable context rewriting stage.
#[async_trait]
pub trait ContextRefiner: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the next refined timeline.
    async fn refine(
        &self,
        raw: &[Message],
        refined: &[Message],
    ) -> Result<Vec<Message>, RefinerError>;

    /// Tools this refiner contributes to the loop.
    fn injected_tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }
}

/// Leaves the refined timeline as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRefiner;

#[async_trait]
impl ContextRefiner for IdentityRefiner {
    fn name(&self) -> &str {
        "identity"
    }

    async fn refine(
        &self,
        _raw: &[Message],
        refined: &[Message],
    ) -> Result<Vec<Message>, RefinerError> {
        Ok(refined.to_vec())
    }
}
