//! Error types for the notation compiler
//!
//! Only configuration problems are errors. Malformed notation is recovered
//! locally by the lexer and parser (logged and recorded as diagnostics), so a
//! long transcription with one bad token still compiles.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("cannot read config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("no duration table entry for time modifier '{0}'")]
    UnknownDurationGlyph(String),

    #[error("page geometry cannot hold any content: {reason}")]
    PageTooSmall { reason: String },

    #[error("unsupported score type '{0}'")]
    UnsupportedScoreType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
