//! Completion provider abstraction
//!
//! Provides a common interface for the one-shot and streamed completion
//! protocols, so the conversation engine can be exercised against a mock
//! provider in tests.

mod error;
mod openai;
mod sse;
pub mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiClient;
pub use types::{ChatMessage, CompletionRequest, Role};

use async_trait::async_trait;
use futures::stream::BoxStream;

/// A stream of content deltas from a streamed completion
pub type DeltaStream = BoxStream<'static, Result<String, LlmError>>;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Make a non-streaming completion request, returning the assistant
    /// message content. An empty `choices` list is an error.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Open a streamed completion; deltas arrive in production order and
    /// the stream ends at the provider's end-of-stream signal.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<DeltaStream, LlmError>;
}
