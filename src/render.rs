//! Thin styled-output helpers
//!
//! Deliberately minimal: a handful of colored prefixes over plain
//! `println`. No markdown engine, no layout.

use crossterm::style::Stylize;

pub fn print_answer(text: &str) {
    println!("{text}");
}

pub fn print_success(text: &str) {
    println!("{}", text.to_string().green());
}

pub fn print_warning(text: &str) {
    println!("{}", text.to_string().yellow());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.to_string().red());
}

pub fn print_help(text: &str) {
    println!("{}", text.to_string().dark_grey());
}

/// The interactive prompt marker for the given mode label.
pub fn prompt_marker(mode: &str) -> String {
    match mode {
        "exec" => format!("{} ", "exec ❯".magenta()),
        "config" => format!("{} ", "config ❯".yellow()),
        _ => format!("{} ", "chat ❯".cyan()),
    }
}

pub const HELP_MESSAGE: &str = "\
Usage: type a request and press Enter.
  Tab        switch between exec and chat mode (resets that conversation)
  Up / Down  recall previous inputs
  Ctrl+H     show this help
  Ctrl+L     clear the screen
  Ctrl+R     reset conversation and history
  Ctrl+S     edit settings
  Ctrl+C     interrupt / quit";

pub const CONFIG_MESSAGE: &str = "\
No configuration found. Enter your OpenAI API key to create one:";
