use crate::utils::parser::ParseError;
use lsn::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Lab(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{what} not found at '{path}'; {hint}", path = path.display())]
    MissingInput {
        what: &'static str,
        path: PathBuf,
        hint: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
