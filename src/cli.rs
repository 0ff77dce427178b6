//! Command line interface

use crate::engine::EngineMode;
use crate::session::RunMode;
use clap::Parser;
use std::io::{IsTerminal, Read};

#[derive(Parser)]
#[command(name = "aish")]
#[command(about = "AI-powered shell assistant for your terminal")]
#[command(version)]
struct Cli {
    /// Start in exec mode (the assistant proposes shell commands)
    #[arg(short = 'e', long, conflicts_with = "chat")]
    exec: bool,

    /// Start in chat mode (streamed conversational answers)
    #[arg(short = 'c', long)]
    chat: bool,

    /// Prompt to answer. With a prompt the assistant replies once and
    /// exits; without one it starts an interactive session.
    prompt: Vec<String>,
}

/// Parsed invocation, with piped stdin already consumed.
pub struct Invocation {
    pub run_mode: RunMode,
    /// Mode forced by a flag. `None` falls back to the configured
    /// default.
    pub mode_override: Option<EngineMode>,
    /// The one-shot prompt, when arguments were given.
    pub prompt: Option<String>,
    /// Text piped into stdin, if any.
    pub pipe: Option<String>,
}

pub fn parse() -> Invocation {
    let cli = Cli::parse();

    let mode_override = if cli.exec {
        Some(EngineMode::Exec)
    } else if cli.chat {
        Some(EngineMode::Chat)
    } else {
        None
    };

    // Whitespace-only prompts fall through to the interactive session.
    let prompt = Some(cli.prompt.join(" "))
        .filter(|p| !p.trim().is_empty());

    Invocation {
        run_mode: if prompt.is_some() {
            RunMode::OneShot
        } else {
            RunMode::Repl
        },
        mode_override,
        prompt,
        pipe: read_pipe(),
    }
}

/// Read piped input when stdin is not a terminal. Returns `None` for
/// an interactive stdin or an empty pipe.
fn read_pipe() -> Option<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }

    let mut buffer = String::new();
    if stdin.read_to_string(&mut buffer).is_err() {
        return None;
    }

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
