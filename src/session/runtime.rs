//! Session runtime
//!
//! Owns the terminal, the engine, and the event loop. All phase changes
//! go through [`transition`]; this module only executes the effects it
//! returns and feeds follow-up events back through its own channel.

use super::effect::SessionEffect;
use super::event::SessionEvent;
use super::state::{QueryKind, RunMode, SessionContext, SessionPhase};
use super::transition::{transition, TransitionError};
use crate::config::{Config, ConfigError};
use crate::engine::{ConversationEngine, EngineMode, InterruptHandle, StreamChunk};
use crate::exec;
use crate::history::HistoryLog;
use crate::llm::{LlmError, OpenAiClient};
use crate::render;
use crate::system::SystemInfo;
use crossterm::cursor::MoveToColumn;
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
}

/// The engine plus the session-side ends of its channels.
struct EngineHandles {
    engine: Arc<Mutex<ConversationEngine>>,
    chunk_rx: mpsc::Receiver<StreamChunk>,
    interrupt: InterruptHandle,
}

fn build_engine(
    config: &Config,
    mode: EngineMode,
    pipe: Option<&str>,
) -> Result<EngineHandles, SessionError> {
    let proxy = if config.ai.proxy.is_empty() {
        None
    } else {
        Some(config.ai.proxy.as_str())
    };
    let client = OpenAiClient::new(&config.ai.api_key, proxy)?;

    let mut engine = ConversationEngine::new(Arc::new(client), mode, config);
    if let Some(pipe) = pipe {
        engine.set_pipe(pipe);
    }
    let chunk_rx = engine.take_chunk_receiver();
    let interrupt = engine.interrupt_handle();

    Ok(EngineHandles {
        engine: Arc::new(Mutex::new(engine)),
        chunk_rx,
        interrupt,
    })
}

/// What woke the event loop up.
enum Wake {
    Session(SessionEvent),
    Chunk(StreamChunk),
    Terminal(TermEvent),
}

pub struct SessionRuntime {
    phase: SessionPhase,
    context: SessionContext,
    system: SystemInfo,
    pipe: Option<String>,
    engine: Option<EngineHandles>,
    history: HistoryLog,
    input: String,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: mpsc::Receiver<SessionEvent>,
    /// One-shot prompt held back until configuration completes.
    pending_prompt: Option<String>,
    raw_mode: bool,
    quit: bool,
    /// Quit once the interrupted stream's terminal chunk is drained.
    quit_after_drain: bool,
}

impl SessionRuntime {
    /// Build a session. A `None` config means no file was found; the
    /// session starts in its configuration phase and builds the engine
    /// once a key is provided.
    pub fn new(
        config: Option<Config>,
        system: SystemInfo,
        run_mode: RunMode,
        mode: EngineMode,
        pipe: Option<String>,
    ) -> Result<Self, SessionError> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let (phase, engine) = match config {
            Some(config) => (
                SessionPhase::Idle,
                Some(build_engine(&config, mode, pipe.as_deref())?),
            ),
            None => (SessionPhase::Configuring, None),
        };

        Ok(Self {
            phase,
            context: SessionContext::new(run_mode, mode),
            system,
            pipe,
            engine,
            history: HistoryLog::new(),
            input: String::new(),
            event_tx,
            event_rx,
            pending_prompt: None,
            raw_mode: false,
            quit: false,
            quit_after_drain: false,
        })
    }

    /// Answer a single prompt and exit.
    pub async fn run_once(mut self, prompt: String) -> Result<(), SessionError> {
        if self.engine.is_none() {
            self.pending_prompt = Some(prompt);
            render::print_help(render::CONFIG_MESSAGE);
            // Blank keys and failed writes leave the phase at Configuring,
            // so keep asking until configuration actually completes.
            while matches!(self.phase, SessionPhase::Configuring) {
                let key = read_stdin_line().await?;
                self.dispatch(SessionEvent::InputSubmitted { input: key })
                    .await;
            }
        } else {
            self.dispatch(SessionEvent::InputSubmitted { input: prompt })
                .await;
        }

        while !self.quit {
            if let SessionPhase::Confirming { .. } = self.phase {
                std::io::stdout().flush()?;
                let answer = read_stdin_line().await?;
                let yes = matches!(answer.trim(), "y" | "Y");
                self.dispatch(SessionEvent::ConfirmAnswer { yes }).await;
                continue;
            }

            if let Some(wake) = self.next_wake(None).await {
                self.handle_wake(wake).await;
            }
        }
        Ok(())
    }

    /// Interactive loop. Returns when the user quits.
    pub async fn run_repl(mut self) -> Result<(), SessionError> {
        let mut keys = EventStream::new();

        terminal::enable_raw_mode()?;
        self.raw_mode = true;

        if self.engine.is_none() {
            self.print_plain(|| render::print_help(render::CONFIG_MESSAGE));
        }
        self.redraw_prompt();

        while !self.quit {
            if let Some(wake) = self.next_wake(Some(&mut keys)).await {
                self.handle_wake(wake).await;
            }
        }

        terminal::disable_raw_mode()?;
        println!();
        Ok(())
    }

    /// Wait for the next event from any source. `keys` is absent in
    /// one-shot mode.
    async fn next_wake(&mut self, keys: Option<&mut EventStream>) -> Option<Wake> {
        let event_rx = &mut self.event_rx;
        let chunk_rx = self.engine.as_mut().map(|h| &mut h.chunk_rx);

        let chunk_wake = async {
            match chunk_rx {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };
        let key_wake = async {
            match keys {
                Some(stream) => stream.next().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            Some(event) = event_rx.recv() => Some(Wake::Session(event)),
            Some(chunk) = chunk_wake => Some(Wake::Chunk(chunk)),
            Some(term) = key_wake => match term {
                Ok(term) => Some(Wake::Terminal(term)),
                Err(e) => {
                    tracing::warn!(error = %e, "Terminal event stream failed");
                    None
                }
            },
        }
    }

    async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Session(event) => self.dispatch(event).await,
            Wake::Chunk(chunk) => self.dispatch(SessionEvent::StreamChunk { chunk }).await,
            Wake::Terminal(TermEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                self.handle_key(key.code, key.modifiers).await;
            }
            Wake::Terminal(_) => {}
        }
    }

    /// Run one event through the transition function and execute the
    /// resulting effects in order.
    async fn dispatch(&mut self, event: SessionEvent) {
        match transition(&self.phase, &self.context, event) {
            Ok(result) => {
                self.phase = result.new_phase;
                for effect in result.effects {
                    self.execute_effect(effect).await;
                }
                if self.quit_after_drain && self.phase.is_idle() {
                    self.quit = true;
                }
                if self.raw_mode && self.phase.accepts_input() {
                    self.redraw_prompt();
                }
            }
            Err(TransitionError::SessionBusy) => {
                tracing::debug!("Input dropped, session busy");
            }
            Err(e @ TransitionError::InvalidTransition(_)) => {
                tracing::warn!(error = %e, "Dropped event");
            }
        }
    }

    async fn execute_effect(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::PushHistory { input } => self.history.add(input),

            SessionEffect::StartExec { input } => {
                let Some(handles) = &self.engine else { return };
                let engine = Arc::clone(&handles.engine);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let outcome = engine.lock().await.exec_completion(&input).await;
                    let event = match outcome {
                        Ok(result) => SessionEvent::ExecResolved { result },
                        Err(e) => SessionEvent::ExecFailed {
                            message: e.to_string(),
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            SessionEffect::StartChatStream { input } => {
                let Some(handles) = &self.engine else { return };
                let engine = Arc::clone(&handles.engine);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    // Chunks flow through the engine's own channel; only
                    // a failure to stream at all surfaces here.
                    if let Err(e) = engine.lock().await.chat_stream_completion(&input).await {
                        let _ = event_tx
                            .send(SessionEvent::StreamFailed {
                                message: e.to_string(),
                            })
                            .await;
                    }
                });
            }

            SessionEffect::PrintDelta { content } => self.print_delta(&content),

            SessionEffect::FinishStream => self.print_plain(|| println!()),

            SessionEffect::PrintAnswer { text } => {
                self.print_plain(|| render::print_answer(&text));
            }

            SessionEffect::PrintProposal {
                command,
                explanation,
            } => {
                self.print_plain(|| {
                    println!("{}", command.bold());
                    render::print_help(&explanation);
                    render::print_warning("Confirm execution? [y/N]");
                });
            }

            SessionEffect::PrintSuccess { text } => {
                self.print_plain(|| render::print_success(&text));
            }

            SessionEffect::PrintWarning { text } => {
                self.print_plain(|| render::print_warning(&text));
            }

            SessionEffect::PrintError { text } => {
                self.print_plain(|| render::print_error(&text));
            }

            SessionEffect::RunCommand { command } => {
                let was_raw = self.raw_mode;
                if was_raw {
                    let _ = terminal::disable_raw_mode();
                    self.raw_mode = false;
                }
                let outcome = exec::run_interactive(&command).await;
                if was_raw {
                    let _ = terminal::enable_raw_mode();
                    self.raw_mode = true;
                }
                let _ = self
                    .event_tx
                    .send(SessionEvent::CommandFinished { outcome })
                    .await;
            }

            SessionEffect::WriteConfig { key } => match Config::write_initial(&key, self.system.clone()) {
                Ok(config) => {
                    self.apply_config(config);
                    self.print_plain(|| render::print_success("[settings saved]"));
                    if let Some(prompt) = self.pending_prompt.take() {
                        let _ = self
                            .event_tx
                            .send(SessionEvent::InputSubmitted { input: prompt })
                            .await;
                    }
                }
                Err(e) => {
                    self.print_plain(|| render::print_error(&format!("[error] {e}")));
                    // Writing failed, so a key is still needed.
                    self.phase = SessionPhase::Configuring;
                }
            },

            SessionEffect::ReloadConfig => match Config::load(self.system.clone()) {
                Ok(config) => self.apply_config(config),
                Err(e) => {
                    self.print_plain(|| render::print_error(&format!("[error] {e}")));
                }
            },

            SessionEffect::Quit => self.quit = true,
        }
    }

    /// Swap in a fresh engine built from `config`, keeping the active
    /// mode and pipe input.
    fn apply_config(&mut self, config: Config) {
        match build_engine(&config, self.context.mode, self.pipe.as_deref()) {
            Ok(handles) => self.engine = Some(handles),
            Err(e) => {
                self.print_plain(|| render::print_error(&format!("[error] {e}")));
            }
        }
    }

    async fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        // Global bindings first
        if modifiers.contains(KeyModifiers::CONTROL) {
            match code {
                KeyCode::Char('c') => {
                    self.handle_interrupt();
                    return;
                }
                KeyCode::Char('l') => {
                    self.clear_screen();
                    return;
                }
                KeyCode::Char('h') => {
                    self.print_plain(|| render::print_help(render::HELP_MESSAGE));
                    self.redraw_prompt();
                    return;
                }
                KeyCode::Char('r') if self.phase.is_idle() => {
                    self.reset_conversation().await;
                    return;
                }
                KeyCode::Char('s') if self.phase.is_idle() => {
                    self.open_settings().await;
                    return;
                }
                _ => return,
            }
        }

        if let SessionPhase::Confirming { .. } = self.phase {
            let yes = matches!(code, KeyCode::Char('y' | 'Y'));
            self.dispatch(SessionEvent::ConfirmAnswer { yes }).await;
            return;
        }

        if !self.phase.accepts_input() {
            return;
        }

        match code {
            KeyCode::Char(c) => {
                self.input.push(c);
                self.redraw_prompt();
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.redraw_prompt();
            }
            KeyCode::Enter => {
                let input = std::mem::take(&mut self.input);
                self.echo_submitted(&input);
                self.dispatch(SessionEvent::InputSubmitted { input }).await;
            }
            KeyCode::Tab if self.phase.is_idle() => {
                self.toggle_mode().await;
            }
            KeyCode::Up if self.phase.is_idle() => {
                if let Some(entry) = self.history.previous().map(str::to_string) {
                    self.input = entry;
                    self.redraw_prompt();
                }
            }
            KeyCode::Down if self.phase.is_idle() => {
                if let Some(entry) = self.history.next().map(str::to_string) {
                    self.input = entry;
                    self.redraw_prompt();
                }
            }
            _ => {}
        }
    }

    /// Ctrl+C. Interrupts an active stream, otherwise quits.
    fn handle_interrupt(&mut self) {
        let streaming = matches!(
            self.phase,
            SessionPhase::Querying {
                kind: QueryKind::ChatStream,
                ..
            }
        );
        if streaming {
            // Cancellation only; the producer emits the terminal chunk,
            // which the loop drains before halting.
            if let Some(handles) = &self.engine {
                handles.interrupt.interrupt();
                self.quit_after_drain = true;
            }
        } else {
            self.quit = true;
        }
    }

    /// Tab. Switches modes and resets both conversations for a clean
    /// context switch.
    async fn toggle_mode(&mut self) {
        let next = match self.context.mode {
            EngineMode::Exec => EngineMode::Chat,
            EngineMode::Chat => EngineMode::Exec,
        };
        self.context.mode = next;
        if let Some(handles) = &self.engine {
            let mut engine = handles.engine.lock().await;
            engine.set_mode(next);
            engine.reset_all();
        }
        self.redraw_prompt();
    }

    /// Ctrl+R. Drops all conversation state and input history.
    async fn reset_conversation(&mut self) {
        if let Some(handles) = &self.engine {
            handles.engine.lock().await.reset_all();
        }
        self.history.reset();
        self.clear_screen();
    }

    /// Ctrl+S. Opens the config file in the user's editor, then reloads.
    async fn open_settings(&mut self) {
        // Editor owns the terminal; treated like a confirmed command.
        self.phase = SessionPhase::Executing;

        let was_raw = self.raw_mode;
        if was_raw {
            let _ = terminal::disable_raw_mode();
            self.raw_mode = false;
        }
        let outcome = exec::run_settings_editor(
            &self.system.editor,
            &self.system.config_file.display().to_string(),
        )
        .await;
        if was_raw {
            let _ = terminal::enable_raw_mode();
            self.raw_mode = true;
        }

        self.dispatch(SessionEvent::SettingsClosed { outcome }).await;
    }

    fn clear_screen(&mut self) {
        let _ = execute!(
            std::io::stdout(),
            Clear(ClearType::All),
            crossterm::cursor::MoveTo(0, 0)
        );
        self.redraw_prompt();
    }

    fn redraw_prompt(&self) {
        if !self.raw_mode || !self.phase.accepts_input() {
            return;
        }
        let marker = if matches!(self.phase, SessionPhase::Configuring) {
            render::prompt_marker("config")
        } else {
            render::prompt_marker(self.context.mode.as_str())
        };
        let shown = if matches!(self.phase, SessionPhase::Configuring) {
            "*".repeat(self.input.chars().count())
        } else {
            self.input.clone()
        };
        let _ = execute!(
            std::io::stdout(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{marker}{shown}"))
        );
    }

    /// Leave the submitted line on screen before the response arrives.
    fn echo_submitted(&mut self, input: &str) {
        let configuring = matches!(self.phase, SessionPhase::Configuring);
        let marker = if configuring {
            render::prompt_marker("config")
        } else {
            render::prompt_marker(self.context.mode.as_str())
        };
        let shown = if configuring {
            "*".repeat(input.chars().count())
        } else {
            input.to_string()
        };
        self.print_plain(|| println!("{marker}{shown}"));
    }

    /// Print through `f` with the terminal in its cooked state so
    /// multi-line output lines up, then restore raw mode.
    fn print_plain(&mut self, f: impl FnOnce()) {
        if self.raw_mode {
            let _ = execute!(
                std::io::stdout(),
                MoveToColumn(0),
                Clear(ClearType::CurrentLine)
            );
            let _ = terminal::disable_raw_mode();
            f();
            let _ = terminal::enable_raw_mode();
        } else {
            f();
        }
    }

    fn print_delta(&mut self, content: &str) {
        if self.raw_mode {
            let _ = execute!(
                std::io::stdout(),
                Print(content.replace('\n', "\r\n"))
            );
        } else {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
    }
}

async fn read_stdin_line() -> Result<String, SessionError> {
    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    if read == 0 {
        return Err(SessionError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "stdin closed",
        )));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
