//! External command collaborator
//!
//! Runs a single shell-line string through `bash -c`, attached to the
//! terminal. Execution failure is an expected user-visible outcome, so
//! it is reported as a [`RunOutcome`] rather than an error.

use tokio::process::Command;

/// Result of running an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
}

impl RunOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Shell line handed to `bash -c`, with trailing `;` trimmed and a blank
/// line printed either side of the command's own output. The command's
/// exit status is captured before the trailing `echo` so it survives the
/// wrapping.
pub fn interactive_shell_line(input: &str) -> String {
    format!(
        "echo \"\";{};rc=$?;echo \"\";exit $rc",
        input.trim_end_matches(';')
    )
}

/// Run a proposed command interactively, inheriting the terminal.
pub async fn run_interactive(input: &str) -> RunOutcome {
    run_shell_line(&interactive_shell_line(input)).await
}

/// Open the settings file in the user's editor, inheriting the terminal.
pub async fn run_settings_editor(editor: &str, config_file: &str) -> RunOutcome {
    run_shell_line(&format!("{editor} {config_file}")).await
}

async fn run_shell_line(line: &str) -> RunOutcome {
    tracing::debug!(command = %line, "Spawning shell command");

    let status = Command::new("bash").arg("-c").arg(line).status().await;

    match status {
        Ok(status) if status.success() => RunOutcome::ok("[ok]"),
        Ok(status) => RunOutcome::failed(format!("[error] exit status: {status}")),
        Err(e) => RunOutcome::failed(format!("[error] {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{interactive_shell_line, run_interactive};

    #[test]
    fn trailing_semicolons_are_trimmed() {
        assert_eq!(
            interactive_shell_line("ls -la;;"),
            "echo \"\";ls -la;rc=$?;echo \"\";exit $rc"
        );
    }

    #[test]
    fn plain_command_is_wrapped() {
        assert_eq!(
            interactive_shell_line("pwd"),
            "echo \"\";pwd;rc=$?;echo \"\";exit $rc"
        );
    }

    #[tokio::test]
    async fn successful_command_reports_ok() {
        let outcome = run_interactive("true").await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn failing_command_reports_error() {
        let outcome = run_interactive("false").await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("[error]"));
    }
}
