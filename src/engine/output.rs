//! Engine output types

use serde::Deserialize;

/// Structured result of a one-shot exec completion.
///
/// The provider is instructed to answer with this exact JSON shape; the
/// short field names are the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecResult {
    #[serde(rename = "cmd", default)]
    pub command: String,
    #[serde(rename = "exp", default)]
    pub explanation: String,
    #[serde(rename = "exec", default)]
    pub executable: bool,
}

impl ExecResult {
    /// Textual fallback when the response body is not valid `ExecResult`
    /// JSON: the whole body becomes the explanation.
    pub fn not_executable(explanation: impl Into<String>) -> Self {
        Self {
            command: String::new(),
            explanation: explanation.into(),
            executable: false,
        }
    }
}

/// One increment of a streamed response.
///
/// Exactly one chunk per stream carries `last == true`; its `content` is
/// always empty (the accumulated text lives in the consumer's buffer).
/// `executable` is only meaningful on the final chunk in Exec mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    pub last: bool,
    pub interrupt: bool,
    pub executable: bool,
}

impl StreamChunk {
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            last: false,
            interrupt: false,
            executable: false,
        }
    }

    pub fn finished(executable: bool) -> Self {
        Self {
            content: String::new(),
            last: true,
            interrupt: false,
            executable,
        }
    }

    pub fn interrupted() -> Self {
        Self {
            content: String::new(),
            last: true,
            interrupt: true,
            executable: false,
        }
    }
}
