//! Language-model interface

use async_trait::async_trait;

use crate::llm::{ChatMessage, ModelReply, ToolSpec};
use crate::Result;

/// Language-model interface
///
/// A single blocking request/response; the orchestrator requires no
/// streaming semantics. The tool vocabulary passed in is the only set of
/// actions the model is permitted to propose for this request.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelReply>;
}
