//! CLI output formatting.
//!
//! Human-readable output goes through these helpers so `--json`, `--quiet`
//! and `--color` apply uniformly. Query responses are always JSON.

use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::{OnceLock, RwLock};

use owo_colors::OwoColorize;
use serde_json::json;

use super::command::ColorChoice;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
    pub color: bool,
}

impl OutputConfig {
    #[must_use]
    pub fn new(json: bool, quiet: bool, color: ColorChoice) -> Self {
        let color = match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        };
        Self { json, quiet, color }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    match config_cell().read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    match config_cell().write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

#[must_use]
pub fn is_quiet() -> bool {
    read_config().quiet
}

fn suppressed(config: OutputConfig) -> bool {
    config.json || config.quiet
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    let config = read_config();
    if suppressed(config) {
        return;
    }
    if config.color {
        println!("{} {}", "queryweave".bold(), version.dimmed());
    } else {
        println!("queryweave {version}");
    }
    println!();
}

/// Print a section header.
pub fn section(title: &str) {
    let config = read_config();
    if suppressed(config) {
        return;
    }
    println!();
    if config.color {
        println!("{}", title.bold());
    } else {
        println!("{title}");
    }
}

/// Print multiple lines of content, each indented.
pub fn lines(content: &str) {
    if suppressed(read_config()) {
        return;
    }
    for line in content.lines() {
        println!("  {line}");
    }
}

/// Print a success line.
pub fn success(message: &str) {
    let config = read_config();
    if suppressed(config) {
        return;
    }
    if config.color {
        println!("  {} {}", "✓".green(), message);
    } else {
        println!("  ✓ {message}");
    }
}

/// Print an error line to stderr.
pub fn error(message: &str) {
    let config = read_config();
    if config.json {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
        return;
    }
    if config.color {
        eprintln!("  {} {}", "×".red(), message);
    } else {
        eprintln!("  × {message}");
    }
}

/// Emit a JSON value directly.
pub fn json_output(value: &serde_json::Value) {
    println!("{value}");
}

/// Emit a JSON value pretty-printed.
pub fn json_pretty(value: &impl serde::Serialize) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Color a health label green or red.
#[must_use]
pub fn status(healthy: bool, label: impl Display) -> String {
    let label = label.to_string();
    if !read_config().color {
        return label;
    }
    if healthy {
        label.green().to_string()
    } else {
        label.red().to_string()
    }
}
