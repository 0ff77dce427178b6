//! Conversation engine
//!
//! Owns the per-mode conversation memory, the prompt assembly, and both
//! completion protocols: one-shot exec completions parsed into
//! [`ExecResult`], and streamed chat completions pumped chunk-by-chunk
//! into a single-slot channel consumed by the session loop.

mod output;
mod prompt;
mod store;

pub use output::{ExecResult, StreamChunk};
pub use prompt::{PromptBuilder, NOEXEC_SENTINEL};
pub use store::{EngineMode, MessageStore};

use crate::config::Config;
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest, LlmError};
use regex::Regex;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the producer -> session chunk channel. A single slot keeps
/// the producer in lockstep with the consumer and preserves chunk order.
const CHUNK_CHANNEL_CAPACITY: usize = 1;

pub struct ConversationEngine {
    mode: EngineMode,
    store: MessageStore,
    prompt: PromptBuilder,
    client: Arc<dyn CompletionClient>,
    model: String,
    max_tokens: u32,
    pipe: Option<String>,
    chunk_tx: mpsc::Sender<StreamChunk>,
    chunk_rx: Option<mpsc::Receiver<StreamChunk>>,
    interrupt: InterruptHandle,
}

impl ConversationEngine {
    pub fn new(client: Arc<dyn CompletionClient>, mode: EngineMode, config: &Config) -> Self {
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let interrupt = InterruptHandle::new();

        Self {
            mode,
            store: MessageStore::default(),
            prompt: PromptBuilder::new(config),
            client,
            model: config.ai.model.clone(),
            max_tokens: config.ai.max_tokens,
            pipe: None,
            chunk_tx,
            chunk_rx: Some(chunk_rx),
            interrupt,
        }
    }

    /// Switch the active partition. Neither partition's content is
    /// touched.
    pub fn set_mode(&mut self, mode: EngineMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Empty only the active mode's partition.
    pub fn clear(&mut self) {
        self.store.clear(self.mode);
    }

    /// Empty both partitions.
    pub fn reset_all(&mut self) {
        self.store.reset();
    }

    /// Set the optional pipe/context string. Empty means "none".
    pub fn set_pipe(&mut self, pipe: &str) {
        self.pipe = if pipe.is_empty() {
            None
        } else {
            Some(pipe.to_string())
        };
    }

    /// Take the consumer end of the chunk channel. Called once by the
    /// session at startup.
    ///
    /// # Panics
    /// Panics if called twice.
    pub fn take_chunk_receiver(&mut self) -> mpsc::Receiver<StreamChunk> {
        self.chunk_rx
            .take()
            .expect("chunk receiver already taken")
    }

    /// Handle for interrupting an active stream from the session loop.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    fn request(&self, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: self
                .prompt
                .build(self.mode, self.pipe.as_deref(), self.store.messages(self.mode)),
            stream,
        }
    }

    /// One-shot exec completion. Appends `input` and the raw response to
    /// the active partition, then parses the body as [`ExecResult`].
    /// Malformed structured output degrades to a textual fallback; only
    /// provider errors propagate.
    pub async fn exec_completion(&mut self, input: &str) -> Result<ExecResult, LlmError> {
        self.store.append(self.mode, ChatMessage::user(input));
        let request = self.request(false);

        let started = std::time::Instant::now();
        let content = self.client.complete(&request).await.inspect_err(|e| {
            tracing::error!(model = %self.model, error = %e.message, "Exec completion failed");
        })?;
        tracing::info!(
            model = %self.model,
            duration_ms = %started.elapsed().as_millis(),
            "Exec completion finished"
        );

        self.store
            .append(self.mode, ChatMessage::assistant(content.clone()));

        Ok(parse_exec_result(&content))
    }

    /// Streamed completion. Deltas are pushed to the chunk channel as
    /// they arrive; the terminal chunk carries the executable hint. A
    /// provider error aborts the stream with no terminal chunk.
    pub async fn chat_stream_completion(&mut self, input: &str) -> Result<(), LlmError> {
        let cancel = self.interrupt.arm();
        self.store.append(self.mode, ChatMessage::user(input));
        let request = self.request(true);

        let mut deltas = match self.client.complete_stream(&request).await {
            Ok(deltas) => deltas,
            Err(e) => {
                self.interrupt.disarm();
                tracing::error!(model = %self.model, error = %e.message, "Failed to open stream");
                return Err(e);
            }
        };

        use futures::StreamExt;
        let mut output = String::new();

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(model = %self.model, "Stream interrupted");
                    let _ = self.chunk_tx.send(StreamChunk::interrupted()).await;
                    return Ok(());
                }
                next = deltas.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    output.push_str(&delta);
                    let sent = tokio::select! {
                        () = cancel.cancelled() => {
                            let _ = self.chunk_tx.send(StreamChunk::interrupted()).await;
                            return Ok(());
                        }
                        sent = self.chunk_tx.send(StreamChunk::delta(delta)) => sent,
                    };
                    if sent.is_err() {
                        // Consumer gone; nothing left to do.
                        self.interrupt.disarm();
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    self.interrupt.disarm();
                    tracing::error!(model = %self.model, error = %e.message, "Stream failed");
                    return Err(e);
                }
                None => {
                    let executable = self.mode == EngineMode::Exec
                        && !output.starts_with(NOEXEC_SENTINEL)
                        && !output.contains('\n');

                    let sent = tokio::select! {
                        () = cancel.cancelled() => {
                            let _ = self.chunk_tx.send(StreamChunk::interrupted()).await;
                            return Ok(());
                        }
                        sent = self.chunk_tx.send(StreamChunk::finished(executable)) => sent,
                    };
                    self.interrupt.disarm();
                    if sent.is_ok() {
                        self.store.append(self.mode, ChatMessage::assistant(output));
                    }
                    return Ok(());
                }
            }
        }
    }
}

/// Three-step parse of an exec completion body: strict JSON, then the
/// first brace-delimited substring, then a non-executable textual
/// fallback. Parse failures never surface to the caller.
fn parse_exec_result(content: &str) -> ExecResult {
    if let Ok(result) = serde_json::from_str::<ExecResult>(content) {
        return result;
    }

    let re = Regex::new(r"\{.*?\}").expect("valid brace pattern");
    if let Some(found) = re.find(content) {
        if let Ok(result) = serde_json::from_str::<ExecResult>(found.as_str()) {
            return result;
        }
    }

    ExecResult::not_executable(content)
}

/// Cooperative cancellation for the active stream.
///
/// [`InterruptHandle::interrupt`] only cancels the producer's token and
/// returns immediately; the producer observes the token at its next
/// suspension point and pushes the terminal interrupt chunk itself, from
/// its own task. The handle never touches the chunk channel, so it is
/// safe to call from the consumer side even while a delta sits
/// unconsumed in the slot. Calling it with no stream active is a no-op.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<Mutex<InterruptState>>,
}

struct InterruptState {
    token: CancellationToken,
    active: bool,
}

impl InterruptHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InterruptState {
                token: CancellationToken::new(),
                active: false,
            })),
        }
    }

    /// Arm a fresh token for a new stream.
    fn arm(&self) -> CancellationToken {
        let mut state = self.state.lock().expect("interrupt state poisoned");
        state.token = CancellationToken::new();
        state.active = true;
        state.token.clone()
    }

    fn disarm(&self) {
        let mut state = self.state.lock().expect("interrupt state poisoned");
        state.active = false;
    }

    /// Signal the active stream to stop. Returns without blocking; the
    /// producer emits the terminal interrupt chunk.
    pub fn interrupt(&self) {
        let mut state = self.state.lock().expect("interrupt state poisoned");
        if !state.active {
            return;
        }
        state.active = false;
        state.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_exec_result, ConversationEngine, EngineMode, ExecResult, StreamChunk};
    use crate::config::{AiConfig, Config, UserConfig};
    use crate::llm::{CompletionClient, CompletionRequest, DeltaStream, LlmError, Role};
    use crate::system::SystemInfo;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Arc;

    fn test_config() -> Config {
        Config {
            ai: AiConfig {
                api_key: "sk-test".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                proxy: String::new(),
                temperature: 0.2,
                max_tokens: 1000,
            },
            user: UserConfig::default(),
            system: SystemInfo::analyse(),
        }
    }

    /// Scripted provider: canned one-shot body, canned delta sequence.
    struct MockClient {
        response: String,
        deltas: Vec<Result<String, LlmError>>,
        /// When set, the delta stream never ends after the scripted
        /// deltas, simulating a stalled provider.
        hang_after_deltas: bool,
    }

    impl MockClient {
        fn one_shot(response: &str) -> Self {
            Self {
                response: response.to_string(),
                deltas: vec![],
                hang_after_deltas: false,
            }
        }

        fn streaming(deltas: &[&str]) -> Self {
            Self {
                response: String::new(),
                deltas: deltas.iter().map(|d| Ok((*d).to_string())).collect(),
                hang_after_deltas: false,
            }
        }
    }

    #[async_trait]
    impl CompletionClient for MockClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }

        async fn complete_stream(
            &self,
            _request: &CompletionRequest,
        ) -> Result<DeltaStream, LlmError> {
            let scripted = futures::stream::iter(
                self.deltas
                    .iter()
                    .map(|d| d.as_ref().map(String::clone).map_err(|e| {
                        LlmError::new(e.kind, e.message.clone())
                    }))
                    .collect::<Vec<_>>(),
            );
            if self.hang_after_deltas {
                Ok(scripted.chain(futures::stream::pending()).boxed())
            } else {
                Ok(scripted.boxed())
            }
        }
    }

    fn engine_with(client: MockClient, mode: EngineMode) -> ConversationEngine {
        ConversationEngine::new(Arc::new(client), mode, &test_config())
    }

    #[test]
    fn strict_parse() {
        let result = parse_exec_result(r#"{"cmd":"ls ~","exp":"list","exec":true}"#);
        assert_eq!(
            result,
            ExecResult {
                command: "ls ~".to_string(),
                explanation: "list".to_string(),
                executable: true,
            }
        );
    }

    #[test]
    fn embedded_object_is_extracted() {
        let result = parse_exec_result(r#"noise {"cmd":"pwd","exp":"x","exec":true} trailing"#);
        assert_eq!(result.command, "pwd");
        assert!(result.executable);
    }

    #[test]
    fn free_text_degrades_to_fallback() {
        let result = parse_exec_result("I cannot help with that");
        assert_eq!(result.command, "");
        assert_eq!(result.explanation, "I cannot help with that");
        assert!(!result.executable);
    }

    #[test]
    fn malformed_embedded_object_degrades_to_fallback() {
        let body = r#"sure: {"cmd": truncated"# ;
        let result = parse_exec_result(body);
        assert!(!result.executable);
        assert_eq!(result.explanation, body);
    }

    #[tokio::test]
    async fn exec_completion_appends_both_messages() {
        let mut engine = engine_with(
            MockClient::one_shot(r#"{"cmd":"ls","exp":"list","exec":true}"#),
            EngineMode::Exec,
        );

        let result = engine.exec_completion("list files").await.unwrap();
        assert!(result.executable);

        // user input and raw assistant response both recorded, in order
        let messages = engine.store.messages(EngineMode::Exec);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].content.contains("\"cmd\""));
    }

    #[tokio::test]
    async fn stream_accumulates_and_finishes_with_empty_final_chunk() {
        let mut engine = engine_with(MockClient::streaming(&["Hel", "lo ", "there"]), EngineMode::Chat);
        let mut rx = engine.take_chunk_receiver();

        let pump = tokio::spawn(async move {
            engine.chat_stream_completion("hi").await.unwrap();
            engine
        });

        let mut buffer = String::new();
        loop {
            let chunk = rx.recv().await.unwrap();
            if chunk.last {
                assert!(chunk.content.is_empty());
                assert!(!chunk.executable);
                break;
            }
            buffer.push_str(&chunk.content);
        }
        assert_eq!(buffer, "Hello there");

        let engine = pump.await.unwrap();
        let messages = engine.store.messages(EngineMode::Chat);
        assert_eq!(messages[1].content, "Hello there");
    }

    #[tokio::test]
    async fn single_line_exec_stream_is_executable() {
        let mut engine = engine_with(MockClient::streaming(&["ls ", "-la"]), EngineMode::Exec);
        let mut rx = engine.take_chunk_receiver();

        let pump = tokio::spawn(async move { engine.chat_stream_completion("list").await });

        let mut last = None;
        while let Some(chunk) = rx.recv().await {
            let done = chunk.last;
            last = Some(chunk);
            if done {
                break;
            }
        }
        assert!(last.unwrap().executable);
        pump.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn multiline_or_sentinel_output_is_not_executable() {
        for deltas in [&["ls\n-la"][..], &["[noexec] sorry"][..]] {
            let mut engine = engine_with(MockClient::streaming(deltas), EngineMode::Exec);
            let mut rx = engine.take_chunk_receiver();
            let pump = tokio::spawn(async move { engine.chat_stream_completion("x").await });

            let mut executable = true;
            while let Some(chunk) = rx.recv().await {
                if chunk.last {
                    executable = chunk.executable;
                    break;
                }
            }
            assert!(!executable);
            pump.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn stream_error_pushes_no_terminal_chunk() {
        let client = MockClient {
            response: String::new(),
            deltas: vec![
                Ok("partial".to_string()),
                Err(LlmError::network("connection reset")),
            ],
            hang_after_deltas: false,
        };
        let mut engine = engine_with(client, EngineMode::Chat);
        let mut rx = engine.take_chunk_receiver();

        let pump = tokio::spawn(async move { engine.chat_stream_completion("x").await });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "partial");
        assert!(!first.last);

        let result = pump.await.unwrap();
        assert!(result.is_err());
        // producer is gone and pushed nothing after the delta
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn interrupt_emits_single_terminal_chunk_and_stops_stream() {
        let client = MockClient {
            response: String::new(),
            deltas: vec![Ok("thinking".to_string())],
            hang_after_deltas: true,
        };
        let mut engine = engine_with(client, EngineMode::Chat);
        let mut rx = engine.take_chunk_receiver();
        let handle = engine.interrupt_handle();

        let pump = tokio::spawn(async move { engine.chat_stream_completion("x").await });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "thinking");

        handle.interrupt();

        let terminal = rx.recv().await.unwrap();
        assert!(terminal.last);
        assert!(terminal.interrupt);
        assert!(terminal.content.is_empty());

        pump.await.unwrap().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn interrupt_while_idle_is_a_no_op() {
        let mut engine = engine_with(MockClient::one_shot(""), EngineMode::Chat);
        let mut rx = engine.take_chunk_receiver();
        let handle = engine.interrupt_handle();

        handle.interrupt();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn interrupt_completes_with_an_undrained_chunk_in_the_slot() {
        use std::time::Duration;
        use tokio::time::timeout;

        let client = MockClient {
            response: String::new(),
            deltas: vec![
                Ok("d1".to_string()),
                Ok("d2".to_string()),
                Ok("d3".to_string()),
            ],
            hang_after_deltas: true,
        };
        let mut engine = engine_with(client, EngineMode::Chat);
        let mut rx = engine.take_chunk_receiver();
        let handle = engine.interrupt_handle();

        let pump = tokio::spawn(async move { engine.chat_stream_completion("x").await });

        // Consume only the first delta; the producer parks the next one
        // in the single-slot channel.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "d1");

        // Must not block on the full slot.
        handle.interrupt();

        // The parked delta drains out first, then the terminal chunk.
        let terminal = timeout(Duration::from_secs(1), async {
            loop {
                let chunk = rx.recv().await.unwrap();
                if chunk.last {
                    return chunk;
                }
            }
        })
        .await
        .expect("terminal chunk after interrupt");
        assert!(terminal.interrupt);

        timeout(Duration::from_secs(1), pump)
            .await
            .expect("producer exits after interrupt")
            .unwrap()
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mode_round_trip_preserves_both_partitions() {
        let mut engine = engine_with(
            MockClient::one_shot(r#"{"cmd":"ls","exp":"list","exec":true}"#),
            EngineMode::Exec,
        );
        engine.exec_completion("list files").await.unwrap();

        engine.set_mode(EngineMode::Chat);
        engine.set_mode(EngineMode::Exec);

        assert_eq!(engine.store.messages(EngineMode::Exec).len(), 2);
    }

    #[tokio::test]
    async fn clear_only_touches_active_partition() {
        let mut engine = engine_with(MockClient::one_shot("hi"), EngineMode::Exec);
        engine.exec_completion("a").await.unwrap();
        engine.set_mode(EngineMode::Chat);
        engine.clear();

        assert_eq!(engine.store.messages(EngineMode::Exec).len(), 2);
        assert!(engine.store.messages(EngineMode::Chat).is_empty());
    }
}
