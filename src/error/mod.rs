mod store_error;
mod parser;

use thiserror::Error;

pub use store_error::StoreError;
pub use parser::{parse_store_status, ErrorContext};

#[derive(Error, Debug)]
pub enum AipDriftError {
    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source API error ({status}) at {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Change feed error: {0}")]
    Feed(String),

    #[error("Item not found in source: {0}")]
    ItemNotFound(String),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Transfer failed for '{object}'{}: {message}", segment_suffix(.segment_index))]
    Transfer {
        object: String,
        segment_index: Option<u32>,
        message: String,
    },

    #[error("Integrity check failed for id [{id}] ({path}): {actual} <> {expected}")]
    Integrity {
        id: String,
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn segment_suffix(segment_index: &Option<u32>) -> String {
    segment_index
        .map(|i| format!(" (segment {})", i))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AipDriftError>;
