//! Session phase types

use crate::engine::EngineMode;
use serde::{Deserialize, Serialize};

/// What kind of query is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// One-shot exec completion
    Exec,
    /// Streamed chat completion
    ChatStream,
}

/// The interactive session's phase. Exactly one holds at any instant;
/// input handlers guard on it before acting, since completion results
/// arrive asynchronously from background producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Ready for user input, no pending operations
    #[default]
    Idle,

    /// No persisted configuration exists; collecting the API key
    Configuring,

    /// A completion is in flight. For streams, `buffer` accumulates the
    /// deltas observed so far.
    Querying {
        kind: QueryKind,
        #[serde(default)]
        buffer: String,
    },

    /// A command proposal awaits a y/N answer
    Confirming { command: String },

    /// An external command is attached to the terminal
    Executing,
}

impl SessionPhase {
    pub fn querying(kind: QueryKind) -> Self {
        SessionPhase::Querying {
            kind,
            buffer: String::new(),
        }
    }

    /// Whether user text input is currently accepted.
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionPhase::Idle | SessionPhase::Configuring)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionPhase::Idle)
    }
}

/// How the process was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Terminate after the first delivered response
    OneShot,
    /// Interactive loop; Idle is re-entered after every response
    Repl,
}

/// Context for the transition function: facts that change rarely and
/// never mid-transition.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub run_mode: RunMode,
    pub mode: EngineMode,
}

impl SessionContext {
    pub fn new(run_mode: RunMode, mode: EngineMode) -> Self {
        Self { run_mode, mode }
    }

    pub fn is_one_shot(&self) -> bool {
        self.run_mode == RunMode::OneShot
    }
}
