//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::effect::SessionEffect;
use super::event::SessionEvent;
use super::state::{QueryKind, RunMode, SessionContext, SessionPhase};
use super::transition::transition;
use crate::engine::{EngineMode, ExecResult, StreamChunk};
use crate::exec::RunOutcome;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_mode() -> impl Strategy<Value = EngineMode> {
    prop_oneof![Just(EngineMode::Exec), Just(EngineMode::Chat)]
}

fn arb_run_mode() -> impl Strategy<Value = RunMode> {
    prop_oneof![Just(RunMode::OneShot), Just(RunMode::Repl)]
}

fn arb_context() -> impl Strategy<Value = SessionContext> {
    (arb_run_mode(), arb_mode()).prop_map(|(run_mode, mode)| SessionContext::new(run_mode, mode))
}

fn arb_query_kind() -> impl Strategy<Value = QueryKind> {
    prop_oneof![Just(QueryKind::Exec), Just(QueryKind::ChatStream)]
}

fn arb_phase() -> impl Strategy<Value = SessionPhase> {
    prop_oneof![
        Just(SessionPhase::Idle),
        Just(SessionPhase::Configuring),
        (arb_query_kind(), "[a-zA-Z0-9 ]{0,40}").prop_map(|(kind, buffer)| {
            SessionPhase::Querying { kind, buffer }
        }),
        "[a-z -]{1,30}".prop_map(|command| SessionPhase::Confirming { command }),
        Just(SessionPhase::Executing),
    ]
}

fn arb_exec_result() -> impl Strategy<Value = ExecResult> {
    ("[a-z -]{0,30}", "[a-zA-Z ]{0,40}", any::<bool>()).prop_map(
        |(command, explanation, executable)| ExecResult {
            command,
            explanation,
            executable,
        },
    )
}

fn arb_chunk() -> impl Strategy<Value = StreamChunk> {
    prop_oneof![
        "[a-zA-Z ]{0,20}".prop_map(StreamChunk::delta),
        any::<bool>().prop_map(StreamChunk::finished),
        Just(StreamChunk::interrupted()),
    ]
}

fn arb_event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        "[a-zA-Z ]{0,40}".prop_map(|input| SessionEvent::InputSubmitted { input }),
        arb_exec_result().prop_map(|result| SessionEvent::ExecResolved { result }),
        "[a-zA-Z ]{1,30}".prop_map(|message| SessionEvent::ExecFailed { message }),
        arb_chunk().prop_map(|chunk| SessionEvent::StreamChunk { chunk }),
        "[a-zA-Z ]{1,30}".prop_map(|message| SessionEvent::StreamFailed { message }),
        any::<bool>().prop_map(|yes| SessionEvent::ConfirmAnswer { yes }),
        (any::<bool>(), "[a-zA-Z ]{0,20}").prop_map(|(success, message)| {
            SessionEvent::CommandFinished {
                outcome: if success {
                    RunOutcome::ok(message)
                } else {
                    RunOutcome::failed(message)
                },
            }
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Submitted input is only accepted while the phase accepts input.
    #[test]
    fn input_only_accepted_when_phase_accepts_it(
        phase in arb_phase(),
        context in arb_context(),
        input in "[a-zA-Z][a-zA-Z ]{0,30}",
    ) {
        let result = transition(&phase, &context, SessionEvent::InputSubmitted { input });
        if result.is_ok() {
            prop_assert!(phase.accepts_input());
        }
    }

    /// Non-blank input from Idle always records history before anything else.
    #[test]
    fn history_is_recorded_before_the_query_starts(
        context in arb_context(),
        input in "[a-zA-Z][a-zA-Z ]{0,30}",
    ) {
        let result = transition(
            &SessionPhase::Idle,
            &context,
            SessionEvent::InputSubmitted { input: input.clone() },
        ).unwrap();

        prop_assert_eq!(
            result.effects.first(),
            Some(&SessionEffect::PushHistory { input: input.trim().to_string() })
        );
        let querying = matches!(result.new_phase, SessionPhase::Querying { .. });
        prop_assert!(querying);
    }

    /// Non-terminal chunks keep the stream query alive and never quit.
    #[test]
    fn deltas_never_leave_the_querying_phase(
        context in arb_context(),
        buffer in "[a-zA-Z ]{0,30}",
        content in "[a-zA-Z ]{0,20}",
    ) {
        let phase = SessionPhase::Querying {
            kind: QueryKind::ChatStream,
            buffer: buffer.clone(),
        };
        let result = transition(
            &phase,
            &context,
            SessionEvent::StreamChunk { chunk: StreamChunk::delta(content.clone()) },
        ).unwrap();

        prop_assert_eq!(
            result.new_phase,
            SessionPhase::Querying {
                kind: QueryKind::ChatStream,
                buffer: format!("{buffer}{content}"),
            }
        );
        prop_assert!(!result.effects.contains(&SessionEffect::Quit));
    }

    /// Terminal chunks always return the session to Idle.
    #[test]
    fn terminal_chunks_always_idle(
        context in arb_context(),
        buffer in "[a-zA-Z ]{0,30}",
        interrupt in any::<bool>(),
    ) {
        let chunk = if interrupt {
            StreamChunk::interrupted()
        } else {
            StreamChunk::finished(false)
        };
        let result = transition(
            &SessionPhase::Querying { kind: QueryKind::ChatStream, buffer },
            &context,
            SessionEvent::StreamChunk { chunk },
        ).unwrap();

        prop_assert_eq!(result.new_phase, SessionPhase::Idle);
    }

    /// One-shot sessions quit on every path that delivers a final response.
    #[test]
    fn one_shot_always_quits_on_final_response(
        mode in arb_mode(),
        result in arb_exec_result(),
    ) {
        let context = SessionContext::new(RunMode::OneShot, mode);
        let executable = result.executable && !result.command.trim().is_empty();
        let outcome = transition(
            &SessionPhase::querying(QueryKind::Exec),
            &context,
            SessionEvent::ExecResolved { result },
        ).unwrap();

        if executable {
            // Confirmation still pending, not final yet
            let confirming = matches!(outcome.new_phase, SessionPhase::Confirming { .. });
            prop_assert!(confirming);
        } else {
            prop_assert_eq!(outcome.effects.last(), Some(&SessionEffect::Quit));
        }
    }

    /// A confirmation answer always resolves the Confirming phase.
    #[test]
    fn confirmation_always_resolves(
        context in arb_context(),
        command in "[a-z -]{1,30}",
        yes in any::<bool>(),
    ) {
        let result = transition(
            &SessionPhase::Confirming { command },
            &context,
            SessionEvent::ConfirmAnswer { yes },
        ).unwrap();

        let resolved = !matches!(result.new_phase, SessionPhase::Confirming { .. });
        prop_assert!(resolved);
    }

    /// The transition function never panics, whatever it is fed.
    #[test]
    fn transition_is_total(
        phase in arb_phase(),
        context in arb_context(),
        event in arb_event(),
    ) {
        let _ = transition(&phase, &context, event);
    }
}
