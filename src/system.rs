//! Host environment discovery
//!
//! Collects the facts about the host that get folded into the system
//! prompt's context sentence: OS family, Linux distribution, shell, home
//! directory and preferred editor.

use std::path::{Path, PathBuf};

pub const APPLICATION_NAME: &str = "aish";

/// Snapshot of the host environment, taken once at startup.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub operating_system: OperatingSystem,
    pub distribution: String,
    pub shell: String,
    pub home_directory: String,
    pub username: String,
    pub editor: String,
    pub config_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingSystem {
    Linux,
    MacOs,
    Windows,
    Unknown,
}

impl OperatingSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatingSystem::Linux => "linux",
            OperatingSystem::MacOs => "macos",
            OperatingSystem::Windows => "windows",
            OperatingSystem::Unknown => "unknown",
        }
    }

    fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OperatingSystem::Linux,
            "macos" => OperatingSystem::MacOs,
            "windows" => OperatingSystem::Windows,
            _ => OperatingSystem::Unknown,
        }
    }
}

impl SystemInfo {
    pub fn analyse() -> Self {
        let home_directory = dirs::home_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let config_file = config_file_path(&home_directory);

        Self {
            operating_system: OperatingSystem::current(),
            distribution: detect_distribution(),
            shell: detect_shell(),
            home_directory,
            username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
            editor: std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string()),
            config_file,
        }
    }
}

fn config_file_path(home_directory: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(home_directory).join(".config"))
        .join(APPLICATION_NAME)
        .join(format!("{APPLICATION_NAME}.toml"))
}

/// `$SHELL` basename, e.g. `/usr/bin/zsh` -> `zsh`.
fn detect_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .and_then(|shell| {
            Path::new(&shell)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

fn detect_distribution() -> String {
    if OperatingSystem::current() != OperatingSystem::Linux {
        return String::new();
    }
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .map(|body| parse_os_release(&body))
        .unwrap_or_default()
}

fn parse_os_release(body: &str) -> String {
    body.lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim_matches('"').to_string())
        .unwrap_or_default()
}
