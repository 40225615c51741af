use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File is not valid UTF-8: {}", path.display())]
    Encoding { path: PathBuf },

    #[error("Required input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Audit store schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Parse failure: {0}")]
    ParseFailure(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
