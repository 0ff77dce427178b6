//! Prompt assembly
//!
//! [`PromptBuilder`] deterministically produces the ordered message list
//! sent to the provider: exactly one system message first (mode body +
//! environment context sentence), then an optional pipe message, then the
//! active partition's history in insertion order.

use super::store::EngineMode;
use crate::config::Config;
use crate::llm::ChatMessage;
use crate::system::OperatingSystem;

/// Sentinel prefix the exec prompt instructs the model to emit when no
/// executable command could be produced.
pub const NOEXEC_SENTINEL: &str = "[noexec]";

const EXEC_PROMPT_BODY: &str = "You are aish, a powerful terminal assistant generating a JSON containing a command line for my input.\n\
You will always reply using the following json structure: {\"cmd\":\"the command\", \"exp\": \"some explanation\", \"exec\": true}.\n\
Your answer will always only contain the json structure, never add any advice or supplementary detail or information, even if I asked the same question before.\n\
The field cmd will contain a single line command (don't use new lines, use separators like && and ; instead).\n\
The field exp will contain an short explanation of the command if you managed to generate an executable command, otherwise it will contain the reason of your failure.\n\
The field exec will contain true if you managed to generate an executable command, false otherwise.\n\
Examples:\n\
Me: list all files in my home dir\n\
aish: {\"cmd\":\"ls ~\", \"exp\": \"list all files in your home dir\", \"exec\": true}\n\
Me: list all pods of all namespaces\n\
aish: {\"cmd\":\"kubectl get pods --all-namespaces\", \"exp\": \"list pods from all k8s namespaces\", \"exec\": true}\n\
Me: how are you ?\n\
aish: {\"cmd\":\"\", \"exp\": \"I'm good thanks but I cannot generate a command for this. Use the chat mode to discuss.\", \"exec\": false}";

const CHAT_PROMPT_BODY: &str = "You are aish, a powerful terminal assistant.\n\
You will answer in the most helpful possible way.\n\
Always format your answer in markdown format.\n\n\
For example:\n\
Me: What is 2+2 ?\n\
aish: The answer for `2+2` is `4`\n\
Me: +2 again ?\n\
aish: The answer is `6`\n";

/// Assembles provider message lists from static configuration. Building
/// twice with unchanged inputs yields an identical list.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    context_sentence: String,
}

impl PromptBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            context_sentence: context_sentence(config),
        }
    }

    /// Produce the full outbound message list.
    pub fn build(
        &self,
        mode: EngineMode,
        pipe: Option<&str>,
        history: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let body = match mode {
            EngineMode::Exec => EXEC_PROMPT_BODY,
            EngineMode::Chat => CHAT_PROMPT_BODY,
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "{body}\n{}",
            self.context_sentence
        )));

        if let Some(pipe) = pipe.filter(|p| !p.is_empty()) {
            messages.push(ChatMessage::user(format!(
                "I will work on the following input: {pipe}"
            )));
        }

        messages.extend_from_slice(history);
        messages
    }
}

/// One sentence describing the host, so generated commands fit the
/// user's environment.
fn context_sentence(config: &Config) -> String {
    let system = &config.system;
    let mut part = String::from("My context: ");

    if system.operating_system != OperatingSystem::Unknown {
        part.push_str(&format!(
            "my operating system is {}, ",
            system.operating_system.as_str()
        ));
    }
    if !system.distribution.is_empty() {
        part.push_str(&format!("my distribution is {}, ", system.distribution));
    }
    if !system.home_directory.is_empty() {
        part.push_str(&format!("my home directory is {}, ", system.home_directory));
    }
    if !system.shell.is_empty() {
        part.push_str(&format!("my shell is {}, ", system.shell));
    }
    if !system.username.is_empty() {
        part.push_str(&format!("my username is {}, ", system.username));
    }
    if !system.editor.is_empty() {
        part.push_str(&format!("my editor is {}, ", system.editor));
    }
    part.push_str("take this into account. ");

    if !config.user.preferences.is_empty() {
        part.push_str(&format!("Also, {}.", config.user.preferences));
    }

    part
}
