//! aish - AI-powered shell assistant
//!
//! A terminal client with two conversation modes: exec, where the
//! assistant proposes runnable shell commands, and chat, where answers
//! stream in as prose.

mod cli;
mod config;
mod engine;
mod exec;
mod history;
mod llm;
mod render;
mod session;
mod system;

use config::{Config, ConfigError};
use session::SessionRuntime;
use system::SystemInfo;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Logging goes to stderr so it never interleaves with answers.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aish=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let invocation = cli::parse();
    let system = SystemInfo::analyse();

    let config = match Config::load(system.clone()) {
        Ok(config) => Some(config),
        Err(ConfigError::NotFound(path)) => {
            tracing::info!(path, "No config file, entering configuration");
            None
        }
        Err(e) => {
            render::print_error(&format!("[error] {e}"));
            std::process::exit(1);
        }
    };

    let mode = invocation.mode_override.unwrap_or_else(|| {
        config
            .as_ref()
            .map(|c| match c.user.default_prompt_mode.as_str() {
                "chat" => engine::EngineMode::Chat,
                _ => engine::EngineMode::Exec,
            })
            .unwrap_or_default()
    });

    let runtime = match SessionRuntime::new(
        config,
        system,
        invocation.run_mode,
        mode,
        invocation.pipe,
    ) {
        Ok(runtime) => runtime,
        Err(e) => {
            render::print_error(&format!("[error] {e}"));
            std::process::exit(1);
        }
    };

    let outcome = match invocation.prompt {
        Some(prompt) => runtime.run_once(prompt).await,
        None => runtime.run_repl().await,
    };

    if let Err(e) = outcome {
        let _ = crossterm::terminal::disable_raw_mode();
        render::print_error(&format!("[error] {e}"));
        std::process::exit(1);
    }
}
