//! Text or JSON output for CLI commands.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Print a report: its `Display` form as text, or pretty JSON.
    pub fn emit<T: Serialize + Display>(&self, report: &T) {
        match self {
            OutputFormat::Text => println!("{}", report),
            OutputFormat::Json => match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", report),
            },
        }
    }

    pub fn success(&self, message: &str) {
        match self {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => println!("{}", json!({ "status": "success", "message": message })),
        }
    }

    /// Errors always go to stderr.
    pub fn error(&self, message: &str) {
        match self {
            OutputFormat::Text => eprintln!("Error: {}", message),
            OutputFormat::Json => eprintln!("{}", json!({ "status": "error", "message": message })),
        }
    }
}

/// `Label:   value`, aligned for the status table.
pub fn row(label: &str, value: &str) -> String {
    format!("{:<10} {}", format!("{}:", label), value)
}
