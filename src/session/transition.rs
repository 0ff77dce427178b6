//! Pure session transition function

use super::effect::SessionEffect;
use super::event::SessionEvent;
use super::state::{QueryKind, SessionContext, SessionPhase};
use crate::engine::EngineMode;
use thiserror::Error;

/// Result of a session transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_phase: SessionPhase,
    pub effects: Vec<SessionEffect>,
}

impl TransitionResult {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            new_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: SessionEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("A completion is already in flight")]
    SessionBusy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same phase, context, and event this always produces the
/// same result; every side effect is returned for the runtime to run.
pub fn transition(
    phase: &SessionPhase,
    context: &SessionContext,
    event: SessionEvent,
) -> Result<TransitionResult, TransitionError> {
    match (phase, event) {
        // ============================================================
        // Input handling
        // ============================================================

        // Idle + input -> Querying (kind follows the active mode)
        (SessionPhase::Idle, SessionEvent::InputSubmitted { input }) => {
            let input = input.trim().to_string();
            if input.is_empty() {
                return Ok(TransitionResult::new(SessionPhase::Idle));
            }
            let (kind, start) = match context.mode {
                EngineMode::Exec => (
                    QueryKind::Exec,
                    SessionEffect::StartExec {
                        input: input.clone(),
                    },
                ),
                EngineMode::Chat => (
                    QueryKind::ChatStream,
                    SessionEffect::StartChatStream {
                        input: input.clone(),
                    },
                ),
            };
            Ok(TransitionResult::new(SessionPhase::querying(kind))
                .with_effect(SessionEffect::PushHistory { input })
                .with_effect(start))
        }

        // Configuring + input -> Idle once a key was provided
        (SessionPhase::Configuring, SessionEvent::InputSubmitted { input }) => {
            let key = input.trim().to_string();
            if key.is_empty() {
                return Ok(TransitionResult::new(SessionPhase::Configuring));
            }
            Ok(TransitionResult::new(SessionPhase::Idle)
                .with_effect(SessionEffect::WriteConfig { key }))
        }

        // Input while busy is rejected; the runtime swallows the error
        // and keeps the phase unchanged.
        (
            SessionPhase::Querying { .. } | SessionPhase::Executing,
            SessionEvent::InputSubmitted { .. },
        ) => Err(TransitionError::SessionBusy),

        // ============================================================
        // Exec resolution
        // ============================================================

        // Executable proposal -> Confirming, anything else -> Idle
        (
            SessionPhase::Querying {
                kind: QueryKind::Exec,
                ..
            },
            SessionEvent::ExecResolved { result },
        ) => {
            if result.executable && !result.command.trim().is_empty() {
                Ok(
                    TransitionResult::new(SessionPhase::Confirming {
                        command: result.command.clone(),
                    })
                    .with_effect(SessionEffect::PrintProposal {
                        command: result.command,
                        explanation: result.explanation,
                    }),
                )
            } else {
                let mut result_t = TransitionResult::new(SessionPhase::Idle)
                    .with_effect(SessionEffect::PrintAnswer {
                        text: result.explanation,
                    });
                if context.is_one_shot() {
                    result_t = result_t.with_effect(SessionEffect::Quit);
                }
                Ok(result_t)
            }
        }

        (
            SessionPhase::Querying {
                kind: QueryKind::Exec,
                ..
            },
            SessionEvent::ExecFailed { message },
        ) => {
            let mut result = TransitionResult::new(SessionPhase::Idle)
                .with_effect(SessionEffect::PrintError { text: message });
            if context.is_one_shot() {
                result = result.with_effect(SessionEffect::Quit);
            }
            Ok(result)
        }

        // ============================================================
        // Stream processing
        // ============================================================

        (
            SessionPhase::Querying {
                kind: QueryKind::ChatStream,
                buffer,
            },
            SessionEvent::StreamChunk { chunk },
        ) => {
            if !chunk.last {
                let mut buffer = buffer.clone();
                buffer.push_str(&chunk.content);
                return Ok(TransitionResult::new(SessionPhase::Querying {
                    kind: QueryKind::ChatStream,
                    buffer,
                })
                .with_effect(SessionEffect::PrintDelta {
                    content: chunk.content,
                }));
            }

            let mut result = TransitionResult::new(SessionPhase::Idle);
            if chunk.interrupt {
                result = result.with_effect(SessionEffect::PrintWarning {
                    text: "[interrupt]".to_string(),
                });
            } else {
                result = result.with_effect(SessionEffect::FinishStream);
            }
            if context.is_one_shot() {
                result = result.with_effect(SessionEffect::Quit);
            }
            Ok(result)
        }

        (
            SessionPhase::Querying {
                kind: QueryKind::ChatStream,
                ..
            },
            SessionEvent::StreamFailed { message },
        ) => {
            let mut result = TransitionResult::new(SessionPhase::Idle)
                .with_effect(SessionEffect::PrintError { text: message });
            if context.is_one_shot() {
                result = result.with_effect(SessionEffect::Quit);
            }
            Ok(result)
        }

        // ============================================================
        // Confirmation and execution
        // ============================================================

        (SessionPhase::Confirming { command }, SessionEvent::ConfirmAnswer { yes: true }) => {
            Ok(TransitionResult::new(SessionPhase::Executing).with_effect(
                SessionEffect::RunCommand {
                    command: command.clone(),
                },
            ))
        }

        (SessionPhase::Confirming { .. }, SessionEvent::ConfirmAnswer { yes: false }) => {
            let mut result =
                TransitionResult::new(SessionPhase::Idle).with_effect(SessionEffect::PrintWarning {
                    text: "[cancel]".to_string(),
                });
            if context.is_one_shot() {
                result = result.with_effect(SessionEffect::Quit);
            }
            Ok(result)
        }

        (SessionPhase::Executing, SessionEvent::CommandFinished { outcome }) => {
            let mut result = TransitionResult::new(SessionPhase::Idle);
            result = if outcome.success {
                result.with_effect(SessionEffect::PrintSuccess {
                    text: outcome.message,
                })
            } else {
                result.with_effect(SessionEffect::PrintError {
                    text: outcome.message,
                })
            };
            if context.is_one_shot() {
                result = result.with_effect(SessionEffect::Quit);
            }
            Ok(result)
        }

        (SessionPhase::Executing, SessionEvent::SettingsClosed { outcome }) => {
            let result = TransitionResult::new(SessionPhase::Idle);
            if outcome.success {
                Ok(result
                    .with_effect(SessionEffect::ReloadConfig)
                    .with_effect(SessionEffect::PrintSuccess {
                        text: "[settings ok]".to_string(),
                    }))
            } else {
                Ok(result.with_effect(SessionEffect::PrintError {
                    text: outcome.message,
                }))
            }
        }

        // ============================================================
        // Everything else is a bug in the runtime
        // ============================================================
        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{phase:?} cannot process {event:?}"
        ))),
    }
}
