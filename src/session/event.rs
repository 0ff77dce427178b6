//! Events fed to the session transition function

use crate::engine::{ExecResult, StreamChunk};
use crate::exec::RunOutcome;

/// Everything that can advance the session phase. Key handling that
/// never changes phase (line editing, history navigation, screen
/// clearing) stays in the runtime and does not appear here.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The user submitted a line. In `Idle` it becomes a query, in
    /// `Configuring` it is the API key.
    InputSubmitted { input: String },

    /// An exec completion resolved.
    ExecResolved { result: ExecResult },

    /// An exec completion failed before producing a result.
    ExecFailed { message: String },

    /// A chunk arrived on the stream channel.
    StreamChunk { chunk: StreamChunk },

    /// The stream could not be opened or died mid-flight.
    StreamFailed { message: String },

    /// The user answered a y/N confirmation.
    ConfirmAnswer { yes: bool },

    /// The confirmed command finished running.
    CommandFinished { outcome: RunOutcome },

    /// The settings editor was closed.
    SettingsClosed { outcome: RunOutcome },
}
