use thiserror::Error;

use crate::core::charts::ChartError;
use crate::core::fit::FitError;
use crate::core::physics::quantum_well::PhysicsError;
use crate::core::stats::StatsError;
use crate::core::table::TableError;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}{}", stderr_suffix(.stderr))]
    ProcessFailed {
        command: String,
        status: String,
        stderr: Option<String>,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Table error: {source}")]
    Table {
        #[from]
        source: TableError,
    },

    #[error("Statistics error: {source}")]
    Stats {
        #[from]
        source: StatsError,
    },

    #[error("Fit error: {source}")]
    Fit {
        #[from]
        source: FitError,
    },

    #[error("Physics error: {source}")]
    Physics {
        #[from]
        source: PhysicsError,
    },

    #[error("Chart error: {source}")]
    Chart {
        #[from]
        source: ChartError,
    },
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!(": {}", text),
        _ => String::new(),
    }
}

impl EngineError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}
