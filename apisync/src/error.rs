use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Management API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Collection read stopped after {pages} page(s): {reason}")]
    PartialCollection { pages: usize, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing {artifact} for {kind} '{id}'")]
    MissingArtifact {
        kind: String,
        id: String,
        artifact: String,
    },

    #[error("Snapshot root not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("No resources found under {}", .0.display())]
    NoResources(PathBuf),

    #[error("No valid rows in link mapping {}", .0.display())]
    NoValidRows(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Transport(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
