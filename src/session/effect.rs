//! Effects produced by session transitions

use crate::exec::RunOutcome;

/// Side effects to be executed by the runtime after a transition. The
/// transition function itself never touches the engine, the terminal,
/// or the filesystem.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Record a submitted line in the prompt history
    PushHistory { input: String },

    /// Spawn a one-shot exec completion for `input`
    StartExec { input: String },

    /// Spawn a streamed chat completion for `input`
    StartChatStream { input: String },

    /// Print one streamed delta without a trailing newline
    PrintDelta { content: String },

    /// Terminate the streamed answer's output line
    FinishStream,

    /// Print a complete (non-streamed) answer
    PrintAnswer { text: String },

    /// Print a proposed command and its explanation, then prompt y/N
    PrintProposal { command: String, explanation: String },

    /// Print a success notice
    PrintSuccess { text: String },

    /// Print a cancellation or interrupt notice
    PrintWarning { text: String },

    /// Print an error notice
    PrintError { text: String },

    /// Run the confirmed command attached to the terminal
    RunCommand { command: String },

    /// Persist an initial configuration with the given API key
    WriteConfig { key: String },

    /// Reload configuration from disk and rebuild the engine
    ReloadConfig,

    /// Exit the session loop
    Quit,
}
