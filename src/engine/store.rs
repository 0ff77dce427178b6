//! Per-mode conversation memory

use crate::llm::ChatMessage;
use std::collections::HashMap;

/// Engine operating mode, selecting which conversation partition is
/// active and which system prompt applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineMode {
    #[default]
    Exec,
    Chat,
}

impl EngineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineMode::Exec => "exec",
            EngineMode::Chat => "chat",
        }
    }
}

/// Append-only message lists keyed by mode.
///
/// Switching modes never touches either partition's content; clearing is
/// always explicit.
#[derive(Debug, Default)]
pub struct MessageStore {
    partitions: HashMap<EngineMode, Vec<ChatMessage>>,
}

impl MessageStore {
    pub fn append(&mut self, mode: EngineMode, message: ChatMessage) {
        self.partitions.entry(mode).or_default().push(message);
    }

    pub fn messages(&self, mode: EngineMode) -> &[ChatMessage] {
        self.partitions.get(&mode).map_or(&[], Vec::as_slice)
    }

    /// Empty a single partition.
    pub fn clear(&mut self, mode: EngineMode) {
        if let Some(partition) = self.partitions.get_mut(&mode) {
            partition.clear();
        }
    }

    /// Empty every partition.
    pub fn reset(&mut self) {
        self.partitions.clear();
    }
}
