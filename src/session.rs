//! Interactive session state machine
//!
//! Implements the Elm Architecture pattern with pure phase transitions:
//! the runtime feeds events through [`transition`] and executes the
//! effects it returns.

mod effect;
pub mod event;
mod runtime;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use runtime::SessionRuntime;
pub use state::RunMode;
