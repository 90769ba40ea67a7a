use chrono::{DateTime, Utc};
use clap::ValueEnum;
use console::style;
use serde::Serialize;

use crate::error::Result;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable formatted output with colors (default)
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Plain text without colors or formatting
    Plain,
}

impl OutputFormat {
    /// Check if this format should use colors
    #[must_use]
    pub const fn use_colors(&self) -> bool {
        matches!(self, Self::Human)
    }

    /// Check if this format is machine-readable
    #[must_use]
    pub const fn is_machine_readable(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Envelope wrapping machine-mode payloads.
#[derive(Serialize)]
pub struct MachineResponse<T> {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
}

impl<T: Serialize> MachineResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok",
            timestamp: Utc::now(),
            version: crate::VERSION.to_string(),
            data,
        }
    }
}

/// Print `data` as a machine envelope in JSON mode, otherwise run the
/// human/plain renderer.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    data: &T,
    human: impl FnOnce(&T),
) -> Result<()> {
    if format.is_machine_readable() {
        println!("{}", serde_json::to_string_pretty(&MachineResponse::ok(data))?);
    } else {
        human(data);
    }
    Ok(())
}

/// Success line, styled in human mode.
pub fn success(format: OutputFormat, message: &str) {
    if format.use_colors() {
        println!("{} {message}", style("✓").green().bold());
    } else {
        println!("{message}");
    }
}

/// Section heading, styled in human mode.
pub fn heading(format: OutputFormat, text: &str) {
    if format.use_colors() {
        println!("{}", style(text).bold().underlined());
    } else {
        println!("{text}");
    }
}

/// Dimmed detail text, styled in human mode.
#[must_use]
pub fn dim(format: OutputFormat, text: &str) -> String {
    if format.use_colors() {
        style(text).dim().to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_the_only_machine_format() {
        assert!(OutputFormat::Json.is_machine_readable());
        assert!(!OutputFormat::Human.is_machine_readable());
        assert!(!OutputFormat::Plain.is_machine_readable());
    }

    #[test]
    fn only_human_uses_colors() {
        assert!(OutputFormat::Human.use_colors());
        assert!(!OutputFormat::Plain.use_colors());
    }

    #[test]
    fn machine_envelope_carries_version() {
        let response = MachineResponse::ok(serde_json::json!({"n": 1}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["version"], crate::VERSION);
        assert_eq!(value["data"]["n"], 1);
    }
}
